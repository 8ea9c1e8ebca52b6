use super::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("list", FtpCommand::List(None))]
#[case("list pub", FtpCommand::List(Some("pub".into())))]
#[case("pwd", FtpCommand::Pwd)]
#[case("cd /srv/ftp", FtpCommand::Cd("/srv/ftp".into()))]
#[case("size report.csv", FtpCommand::Size("report.csv".into()))]
#[case("rename a b", FtpCommand::Rename { from: "a".into(), to: "b".into() })]
fn test_parse(#[case] input: &str, #[case] expected: FtpCommand) {
    assert_eq!(FtpCommand::parse(input).unwrap(), expected);
}

#[test]
fn test_path_required() {
    let err = FtpCommand::parse("cd").unwrap_err();
    assert!(err.to_string().contains("'cd' requires a path argument"));
}

#[test]
fn test_unix_listing_line() {
    let entry = listing_entry("drwxr-xr-x 2 ftp ftp 4096 Jan 10 2023 incoming");
    assert_eq!(entry["name"], json!("incoming"));
    assert_eq!(entry["type"], json!("dir"));
    assert_eq!(entry["size"], json!(4096));

    assert_eq!(
        name_and_is_dir("-rw-r--r-- 1 ftp ftp 120 Jan 10 2023 readme.txt"),
        Some(("readme.txt".to_string(), false))
    );
}

#[test]
fn test_unrecognised_listing_kept_raw() {
    assert_eq!(listing_entry("total 8"), json!({ "raw": "total 8" }));
    assert_eq!(name_and_is_dir("total 8"), None);
}
