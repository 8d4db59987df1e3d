use crate::foundation::error::{UpgradeError, UpgradeResult};
use crate::rules::RuleTable;
use crate::template::{FormatTemplate, PLANES_KEY, json_type_name};
use serde_json::Value;
use std::borrow::Cow;

/// Result of rewriting one template.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub document: FormatTemplate,
    /// Number of plane fields whose string value changed.
    pub changed_fields: usize,
}

impl Rewrite {
    pub fn is_changed(&self) -> bool {
        self.changed_fields > 0
    }
}

/// Applies a [`RuleTable`] to the string fields of every plane entry.
///
/// Only direct string values of a plane entry are rewritten. Keys, non-string values, nested
/// arrays/objects and everything outside `planes` pass through untouched.
#[derive(Debug, Clone, Copy)]
pub struct RewriteEngine<'r> {
    rules: &'r RuleTable,
}

impl<'r> RewriteEngine<'r> {
    pub fn new(rules: &'r RuleTable) -> Self {
        Self { rules }
    }

    /// Rewrite `document`, or fail without modifying anything.
    pub fn rewrite(&self, mut document: FormatTemplate) -> UpgradeResult<Rewrite> {
        let Some(planes) = document.planes_mut() else {
            return Ok(Rewrite {
                document,
                changed_fields: 0,
            });
        };

        let planes = check_planes(planes)?;

        let mut changed_fields = 0usize;
        for fields in planes.iter_mut().filter_map(Value::as_object_mut) {
            for value in fields.values_mut() {
                let Value::String(s) = value else {
                    continue;
                };
                let updated = match self.rules.apply(s) {
                    Cow::Borrowed(_) => continue,
                    Cow::Owned(updated) => updated,
                };
                if updated != *s {
                    changed_fields += 1;
                    *s = updated;
                }
            }
        }

        Ok(Rewrite {
            document,
            changed_fields,
        })
    }
}

/// Verify that `planes` is an array of objects before anything is mutated.
fn check_planes(planes: &mut Value) -> UpgradeResult<&mut Vec<Value>> {
    let found = json_type_name(planes);
    let Value::Array(entries) = planes else {
        return Err(UpgradeError::malformed(format!(
            "'{PLANES_KEY}' is {found}, expected an array of objects"
        )));
    };
    if let Some((index, entry)) = entries
        .iter()
        .enumerate()
        .find(|(_, e)| !e.is_object())
    {
        return Err(UpgradeError::type_confusion(index, json_type_name(entry)));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RenameRule;
    use serde_json::json;

    fn template(v: Value) -> FormatTemplate {
        FormatTemplate::from_value(v).unwrap()
    }

    fn rewrite(v: Value) -> UpgradeResult<Rewrite> {
        let rules = RuleTable::xyuv2();
        RewriteEngine::new(&rules).rewrite(template(v))
    }

    #[test]
    fn single_rule_on_plane_field() {
        let out = rewrite(json!({"planes": [{"dims": "macro_px_w"}]})).unwrap();
        assert_eq!(
            out.document,
            template(json!({"planes": [{"dims": "subsampling_mode.macro_px_w"}]}))
        );
        assert_eq!(out.changed_fields, 1);
    }

    #[test]
    fn multiple_rules_fire_on_one_value() {
        let out = rewrite(json!({"planes": [{"offset": "plane[0].macro_px_w"}]})).unwrap();
        assert_eq!(
            out.document.planes(),
            Some(&json!([{"offset": "planes[0].subsampling_mode.macro_px_w"}]))
        );
    }

    #[test]
    fn missing_planes_is_a_noop() {
        let src = json!({"fourcc": "macro_px_w", "bits": 8});
        let out = rewrite(src.clone()).unwrap();
        assert!(!out.is_changed());
        assert_eq!(out.document, template(src));
    }

    #[test]
    fn fields_outside_planes_are_untouched() {
        let out = rewrite(json!({
            "subsampling_mode": {"macro_px_w": 2, "note": "macro_px_w"},
            "size": "plane[0].size + plane[1].size",
            "planes": [{"base_offset": "plane[0].size"}]
        }))
        .unwrap();
        assert_eq!(
            out.document.get("subsampling_mode"),
            Some(&json!({"macro_px_w": 2, "note": "macro_px_w"}))
        );
        assert_eq!(
            out.document.get("size"),
            Some(&json!("plane[0].size + plane[1].size"))
        );
        assert_eq!(
            out.document.planes(),
            Some(&json!([{"base_offset": "planes[0].size"}]))
        );
    }

    #[test]
    fn non_string_values_and_keys_are_preserved() {
        let plane = json!({
            "macro_px_w": 2,
            "interleave": true,
            "line_stride": null,
            "block": {"w": "macro_px_w"},
            "seq": ["plane[0]"],
            "ratio": 0.5
        });
        let out = rewrite(json!({"planes": [plane.clone()]})).unwrap();
        assert!(!out.is_changed());
        assert_eq!(out.document.planes(), Some(&json!([plane])));
    }

    #[test]
    fn migrated_template_is_a_fixpoint() {
        let src = json!({"planes": [{"size": "planes[0].line_stride * 2", "bits": 8}]});
        let once = rewrite(src).unwrap();
        let first = once.document.to_json_pretty().unwrap();

        let rules = RuleTable::xyuv2();
        let twice = RewriteEngine::new(&rules).rewrite(once.document).unwrap();
        assert!(!twice.is_changed());
        assert_eq!(twice.document.to_json_pretty().unwrap(), first);
    }

    #[test]
    fn string_plane_is_type_confusion() {
        let err = rewrite(json!({"planes": [{"a": "macro_px_w"}, "plane[0]"]})).unwrap_err();
        assert!(matches!(
            err,
            UpgradeError::TypeConfusion {
                index: 1,
                found: "a string"
            }
        ));
    }

    #[test]
    fn first_bad_plane_is_reported() {
        let err = rewrite(json!({"planes": [7, null, {"a": "macro_px_w"}]})).unwrap_err();
        assert!(matches!(
            err,
            UpgradeError::TypeConfusion {
                index: 0,
                found: "a number"
            }
        ));
    }

    #[test]
    fn planes_object_is_malformed() {
        let err = rewrite(json!({"planes": {"dims": "macro_px_w"}})).unwrap_err();
        assert!(matches!(err, UpgradeError::MalformedDocument { .. }));
        assert!(err.to_string().contains("'planes' is an object"));
    }

    #[test]
    fn custom_rule_table_is_honoured() {
        let rules = RuleTable::new(vec![RenameRule::new("bpp", "bits_per_pixel")]).unwrap();
        let out = RewriteEngine::new(&rules)
            .rewrite(template(json!({"planes": [{"x": "bpp", "y": "macro_px_w"}]})))
            .unwrap();
        assert_eq!(
            out.document.planes(),
            Some(&json!([{"x": "bits_per_pixel", "y": "macro_px_w"}]))
        );
    }

    #[test]
    fn self_mapping_rule_does_not_count_as_change() {
        let rules = RuleTable::new(vec![RenameRule::new("a", "a")]).unwrap();
        let out = RewriteEngine::new(&rules)
            .rewrite(template(json!({"planes": [{"x": "abc"}]})))
            .unwrap();
        assert!(!out.is_changed());
    }
}
