//! Interpolated references
//!
//! A field value may reference another field (`${trainer.max_epochs}`), a
//! field relative to its own node (`${.run_id}`, one extra leading dot per
//! ancestor level), or an environment variable with a fallback
//! (`${env:MLFLOW_TRACKING_URI,localhost:6101}`; the `oc.env:` spelling from
//! the original tooling is accepted as an alias). References resolve lazily:
//! a target that is itself interpolated resolves first, and the resolved
//! value is written back into the tree so every consumer reads the final
//! value. Reference cycles are rejected.

use super::compose::CompositionError;
use super::value::ConfigValue;

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Expr(Expr),
}

/// A single `${...}` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `dots == 0` is absolute from the root; `dots == n` climbs `n - 1`
    /// levels above the containing node before descending.
    Path { dots: usize, path: String },
    /// Environment variable with optional fallback.
    Env {
        var: String,
        default: Option<String>,
    },
}

/// Split a string into literal and `${...}` segments.
/// Returns `None` when the string contains no interpolation.
pub fn parse(input: &str) -> Option<Vec<Segment>> {
    if !input.contains("${") {
        return None;
    }
    let mut segments = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        segments.push(Segment::Expr(parse_expr(&after[..end])));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Some(segments)
}

fn parse_expr(inner: &str) -> Expr {
    let env_body = inner
        .strip_prefix("env:")
        .or_else(|| inner.strip_prefix("oc.env:"));
    if let Some(body) = env_body {
        let (var, default) = match body.split_once(',') {
            Some((var, default)) => (var.to_string(), Some(default.to_string())),
            None => (body.to_string(), None),
        };
        return Expr::Env { var, default };
    }
    let dots = inner.chars().take_while(|c| *c == '.').count();
    Expr::Path {
        dots,
        path: inner[dots..].to_string(),
    }
}

/// Resolve every interpolated string in the tree in place.
pub fn resolve_tree(root: &mut ConfigValue) -> Result<(), CompositionError> {
    let leaves = root.string_leaf_paths();
    let mut stack = Vec::new();
    for path in leaves {
        resolve_at(root, &path, &mut stack)?;
    }
    Ok(())
}

/// Resolve the value at `path`, recursing through its references, and write
/// the resolved value back. `stack` holds the paths currently being resolved
/// for cycle detection.
fn resolve_at(
    root: &mut ConfigValue,
    path: &str,
    stack: &mut Vec<String>,
) -> Result<ConfigValue, CompositionError> {
    let current = match root.get_path(path) {
        Some(v) => v.clone(),
        None => {
            return Err(CompositionError::UnresolvedInterpolation {
                path: path.to_string(),
                detail: "referenced path does not exist".to_string(),
            })
        }
    };
    let segments = match current.as_str().and_then(parse) {
        Some(segments) => segments,
        None => return Ok(current),
    };

    if stack.iter().any(|p| p == path) {
        return Err(CompositionError::InterpolationCycle(path.to_string()));
    }
    stack.push(path.to_string());

    let whole_value = segments.len() == 1 && matches!(segments[0], Segment::Expr(_));
    let resolved = if whole_value {
        let Segment::Expr(expr) = &segments[0] else {
            unreachable!()
        };
        eval_expr(root, path, expr, stack)?
    } else {
        let mut out = String::new();
        for segment in &segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Expr(expr) => {
                    let value = eval_expr(root, path, expr, stack)?;
                    match value.render_scalar() {
                        Some(s) => out.push_str(&s),
                        None => {
                            return Err(CompositionError::UnresolvedInterpolation {
                                path: path.to_string(),
                                detail: "non-scalar value embedded in string".to_string(),
                            })
                        }
                    }
                }
            }
        }
        ConfigValue::Str(out)
    };

    stack.pop();
    root.set_path(path, resolved.clone());
    Ok(resolved)
}

fn eval_expr(
    root: &mut ConfigValue,
    at: &str,
    expr: &Expr,
    stack: &mut Vec<String>,
) -> Result<ConfigValue, CompositionError> {
    match expr {
        Expr::Env { var, default } => match std::env::var(var) {
            Ok(value) => Ok(ConfigValue::Str(value)),
            Err(_) => match default {
                Some(d) => Ok(ConfigValue::Str(d.clone())),
                None => Err(CompositionError::UnresolvedInterpolation {
                    path: at.to_string(),
                    detail: format!("environment variable '{var}' is not set"),
                }),
            },
        },
        Expr::Path { dots, path } => {
            let target = absolute_target(at, *dots, path).ok_or_else(|| {
                CompositionError::UnresolvedInterpolation {
                    path: at.to_string(),
                    detail: format!("relative reference climbs past the root: {path}"),
                }
            })?;
            let value = resolve_subtree(root, &target, stack)?;
            if value.is_missing() {
                return Err(CompositionError::UnresolvedInterpolation {
                    path: at.to_string(),
                    detail: format!("referenced field '{target}' is unset"),
                });
            }
            Ok(value)
        }
    }
}

/// Resolve the target of a reference. Scalar targets resolve directly;
/// map/list targets have every string leaf under them resolved first so the
/// referencing field receives a fully concrete copy.
fn resolve_subtree(
    root: &mut ConfigValue,
    target: &str,
    stack: &mut Vec<String>,
) -> Result<ConfigValue, CompositionError> {
    let shape = root.get_path(target).cloned();
    match shape {
        None => Err(CompositionError::UnresolvedInterpolation {
            path: target.to_string(),
            detail: "referenced path does not exist".to_string(),
        }),
        Some(ConfigValue::Map(_)) | Some(ConfigValue::List(_)) => {
            let sub_leaves = root
                .get_path(target)
                .map(|v| v.string_leaf_paths())
                .unwrap_or_default();
            for leaf in sub_leaves {
                resolve_at(root, &format!("{target}.{leaf}"), stack)?;
            }
            Ok(root.get_path(target).cloned().unwrap_or(ConfigValue::Null))
        }
        Some(_) => resolve_at(root, target, stack),
    }
}

/// Turn a possibly-relative reference into an absolute dotted path,
/// evaluated against the path of the field holding the reference.
fn absolute_target(at: &str, dots: usize, rel: &str) -> Option<String> {
    if dots == 0 {
        return Some(rel.to_string());
    }
    let mut ancestors: Vec<&str> = at.split('.').collect();
    // One dot addresses the containing node, each further dot one level up.
    for _ in 0..dots {
        ancestors.pop()?;
    }
    if ancestors.is_empty() {
        Some(rel.to_string())
    } else {
        Some(format!("{}.{}", ancestors.join("."), rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(yaml: &str) -> ConfigValue {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_absolute() {
        let segments = parse("${trainer.max_epochs}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Expr(Expr::Path {
                dots: 0,
                path: "trainer.max_epochs".to_string()
            })]
        );
    }

    #[test]
    fn test_parse_relative_and_env() {
        let segments = parse("${..run_id}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Expr(Expr::Path {
                dots: 2,
                path: "run_id".to_string()
            })]
        );
        let segments = parse("${oc.env:TRACKING_URI,localhost:6101}").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Expr(Expr::Env {
                var: "TRACKING_URI".to_string(),
                default: Some("localhost:6101".to_string())
            })]
        );
    }

    #[test]
    fn test_parse_embedded() {
        let segments = parse("${.uri}/#/experiments/${.id}").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], Segment::Literal("/#/experiments/".to_string()));
    }

    #[test]
    fn test_parse_plain_string_is_none() {
        assert!(parse("no interpolation here").is_none());
    }

    #[test]
    fn test_resolve_absolute_reference() {
        let mut root = tree("{a: {x: 7}, b: \"${a.x}\"}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(root.get_path("b").unwrap().as_i64(), Some(7));
    }

    #[test]
    fn test_resolve_sibling_reference() {
        let mut root = tree("{node: {x: hello, y: \"${.x}\"}}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(root.get_path("node.y").unwrap().as_str(), Some("hello"));
    }

    #[test]
    fn test_resolve_parent_level_reference() {
        let mut root = tree("{node: {shared: 3, inner: {y: \"${..shared}\"}}}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(root.get_path("node.inner.y").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn test_resolve_chained_references() {
        let mut root = tree("{a: \"${b}\", b: \"${c}\", c: done}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(root.get_path("a").unwrap().as_str(), Some("done"));
        assert_eq!(root.get_path("b").unwrap().as_str(), Some("done"));
    }

    #[test]
    fn test_resolve_whole_subtree_copy() {
        let mut root = tree(
            "{train: {data: {batch_size: 64, path: \"${train.root}\"}, root: /data}, eval: {data: \"${train.data}\"}}",
        );
        resolve_tree(&mut root).unwrap();
        assert_eq!(
            root.get_path("eval.data.batch_size").unwrap().as_i64(),
            Some(64)
        );
        assert_eq!(
            root.get_path("eval.data.path").unwrap().as_str(),
            Some("/data")
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut root = tree("{a: \"${b}\", b: \"${a}\"}");
        let err = resolve_tree(&mut root).unwrap_err();
        assert!(matches!(err, CompositionError::InterpolationCycle(_)));
    }

    #[test]
    fn test_self_cycle_rejected() {
        let mut root = tree("{a: \"${a}\"}");
        assert!(resolve_tree(&mut root).is_err());
    }

    #[test]
    fn test_env_fallback() {
        let mut root = tree("{uri: \"${env:MODERAR_SURELY_UNSET_VAR,localhost:6101}\"}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(
            root.get_path("uri").unwrap().as_str(),
            Some("localhost:6101")
        );
    }

    #[test]
    fn test_env_unset_without_fallback_fails() {
        let mut root = tree("{uri: \"${env:MODERAR_SURELY_UNSET_VAR}\"}");
        assert!(matches!(
            resolve_tree(&mut root),
            Err(CompositionError::UnresolvedInterpolation { .. })
        ));
    }

    #[test]
    fn test_embedded_string_interpolation() {
        let mut root = tree("{host: localhost, port: 6101, url: \"http://${.host}:${.port}\"}");
        resolve_tree(&mut root).unwrap();
        assert_eq!(
            root.get_path("url").unwrap().as_str(),
            Some("http://localhost:6101")
        );
    }

    #[test]
    fn test_missing_target_fails() {
        let mut root = tree("{a: \"${nope.nothing}\"}");
        assert!(matches!(
            resolve_tree(&mut root),
            Err(CompositionError::UnresolvedInterpolation { .. })
        ));
    }

    #[test]
    fn test_reference_to_unset_required_fails() {
        let mut root = tree("{a: \"${b}\", b: \"???\"}");
        assert!(matches!(
            resolve_tree(&mut root),
            Err(CompositionError::UnresolvedInterpolation { .. })
        ));
    }
}
