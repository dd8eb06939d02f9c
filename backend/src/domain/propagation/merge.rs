//! JSON deep merge for preference documents.

use serde_json::Value;

/// Merges `patch` into `target`.
///
/// Objects merge key by key; any other patch value replaces the target value.
/// Keys absent from `patch` are left untouched.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_merge_without_touching_siblings() {
        let mut prefs = json!({
            "theme": "dark",
            "registration": { "note": "keep me", "payment_status": "pending" },
        });
        deep_merge(
            &mut prefs,
            &json!({ "registration": { "payment_status": "paid", "amount": 50000 } }),
        );

        assert_eq!(
            prefs,
            json!({
                "theme": "dark",
                "registration": { "note": "keep me", "payment_status": "paid", "amount": 50000 },
            })
        );
    }

    #[test]
    fn null_target_becomes_patch() {
        let mut prefs = Value::Null;
        deep_merge(&mut prefs, &json!({ "payer_id": "u-1" }));
        assert_eq!(prefs, json!({ "payer_id": "u-1" }));
    }

    #[test]
    fn scalar_in_patch_replaces_object() {
        let mut prefs = json!({ "registration": { "a": 1 } });
        deep_merge(&mut prefs, &json!({ "registration": "reset" }));
        assert_eq!(prefs, json!({ "registration": "reset" }));
    }

    #[test]
    fn merge_is_idempotent() {
        let patch = json!({ "registration": { "payment_status": "paid" } });
        let mut once = json!({ "x": 1 });
        deep_merge(&mut once, &patch);
        let mut twice = once.clone();
        deep_merge(&mut twice, &patch);
        assert_eq!(once, twice);
    }
}
