//! 멱등성 키 생성.
//!
//! 정규화는 단일 경로입니다: 단일 잡 제출과 스윕 자식 생성 모두 이 모듈을
//! 거칩니다. 경로가 갈라지면 중복 제거가 조용히 깨집니다.

use chrono::NaiveDate;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// JSON 값을 결정적 문자열로 정규화합니다.
///
/// 객체 키를 재귀적으로 정렬하고 공백 없이 직렬화하므로, 필드 순서나
/// 공백만 다른 두 파라미터 블롭은 같은 문자열을 생성합니다.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(key).expect("string key serializes"),
                        canonical_json(&map[key])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => serde_json::to_string(other).expect("scalar serializes"),
    }
}

/// SHA-256 다이제스트의 16진수 문자열.
pub fn digest(payload: &str) -> String {
    let hash = Sha256::digest(payload.as_bytes());
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 단일 잡 제출의 멱등성 키.
///
/// 초기 자본은 호출자가 파라미터 블롭에 병합한 뒤 호출해야 합니다.
pub fn submission_key(
    strategy_name: &str,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    parameters: &Value,
) -> String {
    let payload = format!(
        "{}|{}|{}|{}|{}",
        strategy_name,
        symbol,
        start,
        end,
        canonical_json(parameters)
    );
    digest(&payload)
}

/// 스윕 자식 잡의 멱등성 키.
///
/// 스윕 id가 포함되므로 같은 조합이라도 스윕마다 별도의 잡이 생성됩니다.
pub fn sweep_child_key(
    sweep_id: i64,
    strategy_name: &str,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    parameters: &Value,
) -> String {
    let payload = format!(
        "{}|{}|{}|{}|{}|{}",
        sweep_id,
        strategy_name,
        symbol,
        start,
        end,
        canonical_json(parameters)
    );
    format!("sweep_{}", digest(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = json!({"longPeriod": 50, "shortPeriod": 10});
        let b = json!({"shortPeriod": 10, "longPeriod": 50});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_nested() {
        let a = json!({"b": {"y": 2, "x": 1}, "a": [1, 2]});
        assert_eq!(canonical_json(&a), r#"{"a":[1,2],"b":{"x":1,"y":2}}"#);
    }

    #[test]
    fn test_submission_key_is_deterministic() {
        let params = json!({"shortPeriod": 10, "longPeriod": 50});
        let key1 = submission_key("ma_crossover", "AAPL", date(2024, 1, 1), date(2024, 12, 31), &params);
        let key2 = submission_key("ma_crossover", "AAPL", date(2024, 1, 1), date(2024, 12, 31), &params);

        assert_eq!(key1, key2);
        assert_eq!(key1.len(), 64);
    }

    #[test]
    fn test_submission_key_varies_with_spec() {
        let params = json!({});
        let base = submission_key("BuyAndHold", "AAPL", date(2024, 1, 1), date(2024, 12, 31), &params);

        assert_ne!(
            base,
            submission_key("BuyAndHold", "MSFT", date(2024, 1, 1), date(2024, 12, 31), &params)
        );
        assert_ne!(
            base,
            submission_key("BuyAndHold", "AAPL", date(2024, 1, 2), date(2024, 12, 31), &params)
        );
        assert_ne!(
            base,
            submission_key(
                "BuyAndHold",
                "AAPL",
                date(2024, 1, 1),
                date(2024, 12, 31),
                &json!({"x": 1})
            )
        );
    }

    #[test]
    fn test_sweep_child_key_includes_sweep_id() {
        let params = json!({"shortPeriod": 5});
        let key1 = sweep_child_key(1, "ma_crossover", "AAPL", date(2024, 1, 1), date(2024, 6, 30), &params);
        let key2 = sweep_child_key(2, "ma_crossover", "AAPL", date(2024, 1, 1), date(2024, 6, 30), &params);

        assert_ne!(key1, key2);
        assert!(key1.starts_with("sweep_"));
    }
}
