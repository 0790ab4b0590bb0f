#[cfg(test)]
mod tests {
    use crate::paths::{normalize, rename_spaces_in_place, rewrite_path_lists, MountConvention, MountRoots, REWRITE_DIR};
    use std::fs;
    use tempfile::TempDir;

    fn roots() -> MountRoots {
        MountRoots {
            drive_root: "Z:".to_string(),
            network_root: "/nfs/turbo/lsa-adae".to_string(),
            anchor: "migratedData".to_string(),
        }
    }

    #[test]
    fn test_network_to_drive() {
        let n = normalize("/nfs/turbo/lsa-adae/migratedData/Lab/George", MountConvention::Drive, &roots());
        assert_eq!(n.path, r"Z:\migratedData\Lab\George");
        assert!(!n.reconstructed);
    }

    #[test]
    fn test_drive_to_network() {
        let n = normalize(r"Z:\migratedData\Lab\George\Python", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae/migratedData/Lab/George/Python");
        assert!(!n.reconstructed);
    }

    #[test]
    fn test_drive_to_network_mixed_separators_and_case() {
        let n = normalize("z:/migratedData//Lab\\X\\", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae/migratedData/Lab/X");
    }

    #[test]
    fn test_drive_root_alone() {
        let n = normalize("Z:", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae");
        assert!(!n.reconstructed);
    }

    #[test]
    fn test_round_trip_network_drive_network() {
        let original = "/nfs/turbo/lsa-adae/migratedData/Lab/Sotelo_2023/run 1";
        let drive = normalize(original, MountConvention::Drive, &roots());
        let back = normalize(&drive.path, MountConvention::Network, &roots());
        assert_eq!(back.path, original);
    }

    #[test]
    fn test_already_in_target_convention() {
        let n = normalize("/nfs/turbo/lsa-adae/migratedData/Lab", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae/migratedData/Lab");

        let d = normalize(r"Z:\migratedData", MountConvention::Drive, &roots());
        assert_eq!(d.path, r"Z:\migratedData");
    }

    #[test]
    fn test_network_root_only_replaced_at_boundary() {
        let n = normalize("/nfs/turbo/lsa-adae-other/x", MountConvention::Drive, &roots());
        assert_eq!(n.path, r"\nfs\turbo\lsa-adae-other\x");
    }

    #[test]
    fn test_separatorless_path_is_reconstructed_and_flagged() {
        let n = normalize("Z:migratedDataLab", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae/migratedData/Lab");
        assert!(n.reconstructed);
    }

    #[test]
    fn test_separatorless_path_without_anchor() {
        let n = normalize("Z:Scratch", MountConvention::Network, &roots());
        assert_eq!(n.path, "/nfs/turbo/lsa-adae/Scratch");
        assert!(n.reconstructed);
    }

    #[test]
    fn test_rename_spaces_in_place() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("my folder");
        fs::create_dir(&dir).unwrap();

        let renamed = rename_spaces_in_place(&dir);
        assert_eq!(renamed, tmp.path().join("my_folder"));
        assert!(renamed.is_dir());
        assert!(!dir.exists());
    }

    #[test]
    fn test_rename_spaces_noop_without_spaces() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("plain");
        fs::create_dir(&dir).unwrap();
        assert_eq!(rename_spaces_in_place(&dir), dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_rename_spaces_keeps_name_when_target_exists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a b");
        fs::create_dir(&dir).unwrap();
        fs::create_dir(tmp.path().join("a_b")).unwrap();
        assert_eq!(rename_spaces_in_place(&dir), dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_rewrite_path_lists() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("batch_1.txt"), "Z:\\migratedData\\a\n\nZ:\\migratedData\\b\n").unwrap();
        fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let written = rewrite_path_lists(tmp.path(), MountConvention::Network, &roots()).unwrap();
        assert_eq!(written, vec![tmp.path().join(REWRITE_DIR).join("batch_1.txt")]);

        let content = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(
            content,
            "/nfs/turbo/lsa-adae/migratedData/a\n/nfs/turbo/lsa-adae/migratedData/b\n"
        );
        assert!(!tmp.path().join(REWRITE_DIR).join("notes.md").exists());
    }
}
