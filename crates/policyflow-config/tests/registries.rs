use std::collections::BTreeSet;

use policyflow_config::provider::*;
use policyflow_config::registry::TypeMap;
use policyflow_config::{ACTIONS, AutomationsConfigurationModel, ConfigError, TRIGGERS};
use serde_json::{Value, json};

/// Every registered key (aliases included) must decode from a minimal body,
/// and the table below must not miss a key.
fn assert_total<T>(map: &TypeMap<T>, bodies: &[(&str, Value)]) {
  let registered: BTreeSet<&str> = map.keys().collect();
  let covered: BTreeSet<&str> = bodies.iter().map(|(key, _)| *key).collect();
  assert_eq!(registered, covered, "{} keys without a sample body", map.category());

  for (key, body) in bodies {
    let mut object = serde_json::Map::new();
    object.insert(key.to_string(), body.clone());
    if let Err(err) = map.from_value(Value::Object(object)) {
      panic!("{} '{}' failed to decode: {}", map.category(), key, err);
    }
  }
}

fn common(alias: &str, extra: Value) -> Value {
  let mut body = json!({"name": alias, "alias": alias});
  if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), extra) {
    target.extend(extra);
  }
  body
}

#[test]
fn test_text_providers_are_total() {
  assert_total(
    &TEXT_PROVIDERS,
    &[
      ("staticText", json!("x")),
      ("objectPathLookupText", json!("/a")),
      ("objectPathLookupTextOrEmpty", json!({"path": "/a"})),
      ("concatenatedText", json!(["a", "b"])),
      ("textConcatenation", json!(["a"])),
      ("templateText", json!({"template": "{{ a }}"})),
      ("liquidText", json!({"template": "x"})),
      ("integerToText", json!(1)),
      ("numberToText", json!(1.5)),
      ("dateToText", json!({"date": "2024-01-01"})),
      ("jsonText", json!({"staticObject": {}})),
    ],
  );
}

#[test]
fn test_numeric_providers_are_total() {
  assert_total(
    &INTEGER_PROVIDERS,
    &[
      ("staticInteger", json!(1)),
      ("objectPathLookupInteger", json!("/a")),
      ("textToInteger", json!("1")),
      ("parseTextInteger", json!("1")),
      ("countListItems", json!([])),
      ("addIntegers", json!([1, 2])),
    ],
  );
  assert_total(
    &NUMBER_PROVIDERS,
    &[
      ("staticNumber", json!(1.5)),
      ("objectPathLookupNumber", json!("/a")),
      ("textToNumber", json!("1.25")),
      ("integerToNumber", json!(1)),
      ("sumNumbers", json!([1, 2.5])),
    ],
  );
}

#[test]
fn test_condition_providers_are_total() {
  assert_total(
    &CONDITION_PROVIDERS,
    &[
      ("staticCondition", json!(true)),
      ("objectPathLookupCondition", json!("/a")),
      ("textIsEqualToCondition", json!({"text": "a", "isEqualTo": "a"})),
      ("textContainsCondition", json!({"text": "abc", "contains": "b"})),
      ("integerIsGreaterThanCondition", json!({"integer": 2, "isGreaterThan": 1})),
      ("numberIsGreaterThanCondition", json!({"number": 2.5, "isGreaterThan": 1})),
      ("andCondition", json!([true, false])),
      ("orCondition", json!([true])),
      ("notCondition", json!(true)),
      (
        "objectContainsPropertyCondition",
        json!({"object": {"staticObject": {}}, "propertyName": "a"}),
      ),
      ("listIsEmptyCondition", json!([])),
      ("valueIsSetCondition", json!("/a")),
    ],
  );
}

#[test]
fn test_temporal_providers_are_total() {
  let one_day = json!({"duration": {"value": 1, "unit": "days"}});
  assert_total(
    &DATE_PROVIDERS,
    &[
      ("objectPathLookupDate", json!("/a")),
      ("textToDate", json!("2024-01-01")),
      ("currentDate", json!({})),
    ],
  );
  assert_total(
    &TIME_PROVIDERS,
    &[
      ("objectPathLookupTime", json!("/a")),
      ("textToTime", json!("10:30")),
    ],
  );
  assert_total(
    &DATE_TIME_PROVIDERS,
    &[
      ("objectPathLookupDateTime", json!("/a")),
      ("textToDateTime", json!("2024-01-01T00:00:00Z")),
      ("currentDateTime", json!({})),
      (
        "addDurationToDateTime",
        json!({"dateTime": {"currentDateTime": {}}, "duration": one_day}),
      ),
    ],
  );
  assert_total(
    &DURATION_PROVIDERS,
    &[
      ("duration", json!({"value": 1, "unit": "hours"})),
      ("textToDuration", json!("PT1H")),
    ],
  );
  assert_total(
    &PERIOD_PROVIDERS,
    &[
      (
        "periodBetweenDateTimes",
        json!({"from": "2024-01-01T00:00:00Z", "to": "2024-02-01T00:00:00Z"}),
      ),
      ("lastDuration", json!({"duration": one_day})),
    ],
  );
}

#[test]
fn test_structured_providers_are_total() {
  assert_total(
    &OBJECT_PROVIDERS,
    &[
      ("staticObject", json!({})),
      ("objectPathLookupObject", json!("/a")),
      ("dynamicObject", json!([])),
      ("jsonTextToObject", json!("{}")),
      ("contextEntityObject", json!("quote")),
      ("patchObject", json!({"source": {"staticObject": {}}, "operations": []})),
    ],
  );
  assert_total(
    &PATCH_OPERATIONS,
    &[
      ("add", json!({"path": "/a", "value": 1})),
      ("replace", json!({"path": "/a", "value": 1})),
      ("remove", json!({"path": "/a"})),
      ("copy", json!({"from": "/a", "path": "/b"})),
      ("move", json!({"from": "/a", "path": "/b"})),
    ],
  );
  assert_total(
    &LIST_PROVIDERS,
    &[
      ("staticList", json!([])),
      ("objectPathLookupList", json!("/a")),
      (
        "filterListItems",
        json!({"list": [], "condition": {"filterCondition": {"condition": true}}}),
      ),
      ("mapListItems", json!({"list": [], "value": "x"})),
      ("range", json!({"from": 1, "to": 3})),
    ],
  );
  assert_total(&FILTER_PROVIDERS, &[("filterCondition", json!({"condition": true}))]);
  assert_total(
    &BINARY_PROVIDERS,
    &[
      ("textToBinary", json!("x")),
      ("base64TextToBinary", json!("eA==")),
    ],
  );
  assert_total(
    &FILE_PROVIDERS,
    &[
      ("textFile", json!({"outputFileName": "a.txt", "sourceData": "x"})),
      (
        "binaryFile",
        json!({"outputFileName": "a.bin", "sourceData": {"textToBinary": "x"}}),
      ),
      ("archiveFile", json!({"outputFileName": "a.tar.gz"})),
    ],
  );
  assert_total(
    &ARCHIVE_OPERATIONS,
    &[
      (
        "addFileToArchive",
        json!({"file": {"textFile": {"outputFileName": "a.txt", "sourceData": "x"}}}),
      ),
      ("removeFileFromArchive", json!({"entryName": "a.txt"})),
      ("renameFileInArchive", json!({"entryName": "a.txt", "newEntryName": "b.txt"})),
    ],
  );
  assert_total(
    &EXPRESSION_PROVIDERS,
    &[
      ("evaluateExpression", json!("1 + 1")),
      ("evaluateTextExpression", json!({"objectPathLookupText": "/a"})),
    ],
  );
  assert_total(
    &ENTITY_PROVIDERS,
    &[
      ("contextEntity", json!("quote")),
      ("dynamicEntity", json!({"entityType": "quote", "entityId": "q-1"})),
    ],
  );
}

#[test]
fn test_triggers_are_total() {
  assert_total(
    &TRIGGERS,
    &[
      ("httpTrigger", common("h", json!({"endpoint": {"path": "/x"}}))),
      ("eventTrigger", common("e", json!({}))),
      ("periodicTrigger", common("p", json!({"cronExpression": "* * * * *"}))),
      (
        "extensionPointTrigger",
        common("x", json!({"extensionPoint": "beforeQuoteCalculation"})),
      ),
      (
        "portalPageTrigger",
        common("pp", json!({"entityType": "quote", "pageType": "display"})),
      ),
      ("emailTrigger", common("m", json!({}))),
    ],
  );
}

#[test]
fn test_actions_are_total() {
  let quote = json!({"contextEntity": "quote"});
  assert_total(
    &ACTIONS,
    &[
      ("sendEmailAction", common("a", json!({"to": "a@b.test", "subject": "s"}))),
      ("sendSmsAction", common("a", json!({"to": "+61", "message": "m"}))),
      ("httpRequestAction", common("a", json!({"httpRequest": {"url": "https://x.test"}}))),
      ("raiseEventAction", common("a", json!({"customEventAlias": "e"}))),
      (
        "raiseErrorAction",
        common("a", json!({"error": {"code": "c", "title": "t", "message": "m"}})),
      ),
      (
        "setAdditionalPropertyValueAction",
        common("a", json!({"entity": quote, "propertyAlias": "p", "value": "v"})),
      ),
      (
        "incrementAdditionalPropertyValueAction",
        common("a", json!({"entity": quote, "propertyAlias": "p"})),
      ),
      ("createQuoteAction", common("a", json!({}))),
      ("issuePolicyAction", common("a", json!({}))),
      ("approveQuoteAction", common("a", json!({}))),
      ("declineQuoteAction", common("a", json!({}))),
      ("renewPolicyAction", common("a", json!({"policy": {"contextEntity": "policy"}}))),
      (
        "attachFilesToEntityAction",
        common("a", json!({"entities": [], "attachments": []})),
      ),
      (
        "attachFilesToEntitiesAction",
        common("a", json!({"entities": [], "attachments": []})),
      ),
      ("groupAction", common("a", json!({"actions": []}))),
      ("iterateAction", common("a", json!({"list": [], "actions": []}))),
    ],
  );
}

#[test]
fn test_unknown_keys_are_invalid_configuration() {
  let err = AutomationsConfigurationModel::from_value(json!({
    "automations": [{
      "name": "A",
      "alias": "a",
      "actions": [{
        "httpRequestAction": {
          "name": "Call",
          "alias": "call",
          "httpRequest": {"url": "https://x.test", "content": {"scriptObject": "1 + 1"}}
        }
      }]
    }]
  }))
  .unwrap_err();
  let ConfigError::InvalidConfiguration { key, fragment, .. } = err else {
    panic!("expected invalid configuration");
  };
  assert_eq!(key.as_deref(), Some("scriptObject"));
  assert_eq!(fragment, Some(json!({"scriptObject": "1 + 1"})));
}

#[test]
fn test_unknown_archive_operation_carries_its_fragment() {
  let err = AutomationsConfigurationModel::from_value(json!({
    "automations": [{
      "name": "A",
      "alias": "a",
      "actions": [{
        "attachFilesToEntityAction": {
          "name": "Attach",
          "alias": "attach",
          "entities": [],
          "attachments": [{"archiveFile": {
            "outputFileName": "bundle.tar.gz",
            "operations": [{"zipFolder": {"entryName": "docs"}}]
          }}]
        }
      }]
    }]
  }))
  .unwrap_err();
  let ConfigError::InvalidConfiguration { key, fragment, .. } = err else {
    panic!("expected invalid configuration");
  };
  assert_eq!(key.as_deref(), Some("zipFolder"));
  assert_eq!(fragment, Some(json!({"zipFolder": {"entryName": "docs"}})));
}
