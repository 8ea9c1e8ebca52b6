use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn sample_response() -> CommitResponse {
    serde_json::from_value(json!({
        "results": [
            {
                "columns": ["a", "r", "b"],
                "data": [{
                    "row": [{"name": "Ada"}, {}, {"name": "Bob"}],
                    "graph": {
                        "nodes": [
                            {"id": "1", "elementId": "4:x:1", "labels": ["Person"], "properties": {"name": "Ada"}},
                            {"id": "2", "elementId": "4:x:2", "labels": ["Person"], "properties": {"name": "Bob"}}
                        ],
                        "relationships": [
                            {"id": "7", "elementId": "5:x:7", "type": "KNOWS",
                             "startNode": "1", "endNode": "2",
                             "startNodeElementId": "4:x:1", "endNodeElementId": "4:x:2",
                             "properties": {}}
                        ]
                    }
                }]
            },
            {
                "columns": ["n"],
                "data": [{"row": [1], "graph": {"nodes": [], "relationships": []}}]
            }
        ],
        "errors": []
    }))
    .unwrap()
}

#[test]
fn test_request_asks_for_rows_and_graph() {
    let body = serde_json::to_value(CommitRequest::new(vec!["RETURN 1".to_string()])).unwrap();
    assert_eq!(
        body,
        json!({"statements": [{"statement": "RETURN 1", "resultDataContents": ["row", "graph"]}]})
    );
}

#[test]
fn test_records_accumulate_across_statements() {
    let graph = into_graph_result(sample_response());
    assert_eq!(graph.records.len(), 2);
    assert_eq!(graph.records[0]["a"], json!({"name": "Ada"}));
    assert_eq!(graph.records[1], json!({"n": 1}));
}

#[test]
fn test_nodes_and_relationships_extracted() {
    let graph = into_graph_result(sample_response());
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[0].labels, vec!["Person"]);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].edge_type, "KNOWS");
    assert_eq!(graph.edges[0].start_id, "4:x:1");
    assert_eq!(graph.edges[0].end_id, "4:x:2");
}

#[test]
fn test_error_names_failing_statement() {
    let response: CommitResponse = serde_json::from_value(json!({
        "results": [{"columns": ["x"], "data": []}],
        "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input 'RETRN'"}]
    }))
    .unwrap();
    let err = response.check(3).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Execution error: statement 2 of 3 failed: Neo.ClientError.Statement.SyntaxError: Invalid input 'RETRN'"
    );
}

#[test]
fn test_first_column_values() {
    let response: CommitResponse = serde_json::from_value(json!({
        "results": [{"columns": ["label"], "data": [{"row": ["Person"]}, {"row": ["Movie"]}]}]
    }))
    .unwrap();
    assert_eq!(response.first_column(), vec!["Person", "Movie"]);
    assert!(response.check(1).is_ok());
}
