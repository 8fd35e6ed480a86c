//! Parameter declaration checks and override merging.
//!
//! Unknown parameter names are hard errors before any module loading:
//! a silent typo in a build parameter means silent misconfiguration.
//! Value merging walks assignments in declaration order; later writes win
//! only for parameters declared overridable.

use crate::core::item::Value;
use crate::core::module::ParameterDecl;
use crate::resolver::errors::ResolveError;
use crate::util::Symbol;

/// Validate that every parameter set by a dependency reference is declared
/// by the target module.
pub fn check_dependency_parameter_declarations(
    assignments: &[(Symbol, Value)],
    declarations: &[ParameterDecl],
    module: Symbol,
    product: Symbol,
) -> Result<(), ResolveError> {
    for (name, _) in assignments {
        if !declarations.iter().any(|d| d.name() == *name) {
            return Err(ResolveError::UnknownParameter {
                parameter: name.as_str().to_string(),
                module: module.as_str().to_string(),
                product: product.as_str().to_string(),
                declared: declarations
                    .iter()
                    .map(|d| d.name().as_str().to_string())
                    .collect(),
            });
        }
    }
    Ok(())
}

/// Compute the effective parameter set for a fresh module instance:
/// declaration defaults overlaid with the reference's assignments.
pub fn effective_parameters(
    declarations: &[ParameterDecl],
    assignments: &[(Symbol, Value)],
) -> Vec<(Symbol, Value)> {
    let mut effective: Vec<(Symbol, Value)> = declarations
        .iter()
        .filter_map(|d| d.default().map(|v| (d.name(), v.clone())))
        .collect();

    for (name, value) in assignments {
        if let Some(slot) = effective.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.clone();
        } else {
            effective.push((*name, value.clone()));
        }
    }

    effective
}

/// Merge a later reference's assignments into an already-attached module
/// instance.
///
/// For an overridable parameter the later write wins. For a
/// non-overridable one the first write sticks; a later differing write is
/// logged and dropped.
pub fn merge_parameters(
    existing: &mut Vec<(Symbol, Value)>,
    declarations: &[ParameterDecl],
    assignments: &[(Symbol, Value)],
    module: Symbol,
    product: Symbol,
) {
    for (name, value) in assignments {
        let overridable = declarations
            .iter()
            .find(|d| d.name() == *name)
            .map(|d| d.is_overridable())
            .unwrap_or(true);

        match existing.iter_mut().find(|(n, _)| n == name) {
            Some(slot) if overridable => slot.1 = value.clone(),
            Some(slot) => {
                if slot.1 != *value {
                    tracing::warn!(
                        "product `{}`: parameter `{}.{}` is not overridable, keeping `{}`",
                        product,
                        module,
                        name,
                        slot.1
                    );
                }
            }
            None => existing.push((*name, value.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls() -> Vec<ParameterDecl> {
        vec![
            ParameterDecl::new("warnings").with_default(true),
            ParameterDecl::new("optimization")
                .with_default("fast")
                .overridable(false),
        ]
    }

    #[test]
    fn test_unknown_parameter_is_an_error() {
        let assignments = vec![(Symbol::new("warnigns"), Value::Bool(false))];
        let err = check_dependency_parameter_declarations(
            &assignments,
            &decls(),
            Symbol::new("cpp"),
            Symbol::new("app"),
        )
        .unwrap_err();

        match err {
            ResolveError::UnknownParameter {
                parameter,
                declared,
                ..
            } => {
                assert_eq!(parameter, "warnigns");
                assert_eq!(declared, vec!["warnings", "optimization"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_known_parameters_pass() {
        let assignments = vec![(Symbol::new("warnings"), Value::Bool(false))];
        check_dependency_parameter_declarations(
            &assignments,
            &decls(),
            Symbol::new("cpp"),
            Symbol::new("app"),
        )
        .unwrap();
    }

    #[test]
    fn test_effective_overlays_defaults() {
        let assignments = vec![(Symbol::new("warnings"), Value::Bool(false))];
        let effective = effective_parameters(&decls(), &assignments);

        assert_eq!(
            effective,
            vec![
                (Symbol::new("warnings"), Value::Bool(false)),
                (Symbol::new("optimization"), Value::Str("fast".to_string())),
            ]
        );
    }

    #[test]
    fn test_merge_overridable_last_write_wins() {
        let mut existing = vec![(Symbol::new("warnings"), Value::Bool(true))];
        let assignments = vec![(Symbol::new("warnings"), Value::Bool(false))];

        merge_parameters(
            &mut existing,
            &decls(),
            &assignments,
            Symbol::new("cpp"),
            Symbol::new("app"),
        );

        assert_eq!(existing[0].1, Value::Bool(false));
    }

    #[test]
    fn test_merge_non_overridable_keeps_first() {
        let mut existing = vec![(Symbol::new("optimization"), Value::Str("fast".into()))];
        let assignments = vec![(Symbol::new("optimization"), Value::Str("small".into()))];

        merge_parameters(
            &mut existing,
            &decls(),
            &assignments,
            Symbol::new("cpp"),
            Symbol::new("app"),
        );

        assert_eq!(existing[0].1, Value::Str("fast".to_string()));
    }
}
