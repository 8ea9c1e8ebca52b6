use super::*;
use pretty_assertions::assert_eq;

fn api(vhost: &str) -> ManagementApi {
    ManagementApi::new(
        Url::parse("http://broker.internal:15672/").unwrap(),
        vhost,
        "guest",
        "guest",
    )
    .unwrap()
}

#[test]
fn test_default_vhost_is_encoded() {
    let url = api("/").resource_url("queues").unwrap();
    assert_eq!(url.as_str(), "http://broker.internal:15672/api/queues/%2F");
}

#[test]
fn test_named_vhost() {
    let url = api("staging").resource_url("exchanges").unwrap();
    assert_eq!(url.as_str(), "http://broker.internal:15672/api/exchanges/staging");
}

#[test]
fn test_categorize_sorts_and_names_default_exchange() {
    let nodes = categorize(
        vec!["jobs".into(), "audit".into()],
        vec!["amq.topic".into(), "".into()],
    );
    assert_eq!(nodes[0].name, "Queues");
    let queues: Vec<&str> = nodes[0]
        .children
        .as_ref()
        .unwrap()
        .iter()
        .map(|n| n.name.as_str())
        .collect();
    assert_eq!(queues, vec!["audit", "jobs"]);

    let exchanges = nodes[1].children.as_ref().unwrap();
    assert_eq!(exchanges[0].name, "(AMQP default)");
    assert_eq!(exchanges[0].kind, NodeKind::Exchange);
}
