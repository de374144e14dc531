/*!
 * Laws of output repair and coverage validation
 */

use rand::Rng;
use serde_json::{json, Value};
use yasts::errors::AttemptError;
use yasts::translation::repair::{parse_with_repair, RepairRule};
use yasts::translation::validation::validate_coverage;
use crate::common;

fn random_payload(rng: &mut rand::rngs::StdRng, ids: &[usize]) -> Value {
    let records: Vec<Value> = ids
        .iter()
        .map(|id| json!({"group_id": id, "line": common::random_line(rng, 10)}))
        .collect();
    json!({ "translations": records })
}

#[test]
fn test_parseWithRepair_onValidJson_shouldApplyNothing() {
    let mut rng = common::seeded_rng(3);
    for _ in 0..200 {
        let count = rng.random_range(0..6);
        let ids: Vec<usize> = (1..=count).collect();
        let payload = random_payload(&mut rng, &ids);
        let raw = if rng.random_bool(0.5) {
            payload.to_string()
        } else {
            serde_json::to_string_pretty(&payload).unwrap()
        };

        let repaired = parse_with_repair(&raw).unwrap();
        assert!(repaired.applied.is_empty());
        assert_eq!(repaired.value, payload);
    }
}

#[test]
fn test_parseWithRepair_withFencedAndCommentedOutput_shouldRecover() {
    let raw = "Here you go:\n```json\n{\"translations\": [\n// first one\n{\"group_id\": 1, \"line\": \"Hei\"}\n]}\n```\nAnything else?";
    let repaired = parse_with_repair(raw).unwrap();
    assert_eq!(repaired.value["translations"][0]["line"], "Hei");
    assert!(repaired.applied.contains(&RepairRule::StripWrappers));
    assert!(repaired.applied.contains(&RepairRule::StripLineComments));
}

#[test]
fn test_parseWithRepair_withTruncatedOutput_shouldCloseDelimiters() {
    let raw = r#"{"translations":[{"group_id":1,"line":"Hei"},{"group_id":2,"line":"Moi"}"#;
    let repaired = parse_with_repair(raw).unwrap();
    assert_eq!(repaired.applied, vec![RepairRule::BalanceDelimiters]);
    assert_eq!(repaired.value["translations"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_validateCoverage_onSuccess_shouldReturnExactlyTheFocusIds() {
    let mut rng = common::seeded_rng(5);
    for _ in 0..100 {
        let start = rng.random_range(1..50);
        let len = rng.random_range(1..8);
        let focus: Vec<usize> = (start..start + len).collect();
        let payload = random_payload(&mut rng, &focus);

        let result = validate_coverage(&payload, &focus).unwrap();
        assert_eq!(result.group_ids().collect::<Vec<_>>(), focus);
    }
}

#[test]
fn test_validateCoverage_withRenamedKeys_shouldStillAccept() {
    let payload = json!([{"id": 4, "text": "  Hei  "}, {"group_id": "5", "line": "Moi"}]);
    let result = validate_coverage(&payload, &[4, 5]).unwrap();
    assert_eq!(result.get(4), Some("Hei"));
    assert_eq!(result.get(5), Some("Moi"));
}

#[test]
fn test_validateCoverage_withExtraAndMissing_shouldReportBoth() {
    let payload = json!({"translations": [{"group_id": 1, "line": "a"}, {"group_id": 9, "line": "b"}]});
    let Err(AttemptError::ValidationError(mismatch)) = validate_coverage(&payload, &[1, 2]) else {
        panic!("expected a validation error");
    };
    assert_eq!(mismatch.missing, vec![2]);
    assert_eq!(mismatch.extra, vec![9]);
}
