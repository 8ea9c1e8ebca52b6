use super::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("containers", DockerCommand::Containers)]
#[case("IMAGES", DockerCommand::Images)]
#[case("start web", DockerCommand::Start("web".into()))]
#[case("stop 3f2a", DockerCommand::Stop("3f2a".into()))]
#[case("inspect web", DockerCommand::Inspect("web".into()))]
#[case("logs web", DockerCommand::Logs { container: "web".into(), tail: DEFAULT_LOG_TAIL })]
#[case("logs web 20", DockerCommand::Logs { container: "web".into(), tail: 20 })]
fn test_parse(#[case] input: &str, #[case] expected: DockerCommand) {
    assert_eq!(DockerCommand::parse(input).unwrap(), expected);
}

#[test]
fn test_bad_tail() {
    let err = DockerCommand::parse("logs web lots").unwrap_err();
    assert!(err.to_string().contains("tail must be a number"));
}

#[test]
fn test_container_required() {
    let err = DockerCommand::parse("restart").unwrap_err();
    assert!(err.to_string().contains("'restart' requires a container argument"));
}

#[test]
fn test_unknown_command_lists_vocabulary() {
    let err = DockerCommand::parse("exec web sh").unwrap_err();
    assert!(err.to_string().contains("unknown command 'exec'"));
    assert!(err.to_string().contains("containers, images"));
}
