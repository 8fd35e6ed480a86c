//! Resolution error taxonomy and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{CyclicDependencyReport, Diagnostic, UnknownParameterReport};

/// Error during dependency resolution.
///
/// A failure aborts resolution for the affected product only; siblings
/// keep resolving unless the session is configured fail-fast.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("missing dependency `{dependency}` required by product `{product}`")]
    MissingDependency {
        dependency: String,
        product: String,
    },

    #[error("cyclic dependency among products: {}", products.join(", "))]
    CyclicDependency { products: Vec<String> },

    #[error("product `{product}`: module `{module}` declares no parameter `{parameter}`")]
    UnknownParameter {
        parameter: String,
        module: String,
        product: String,
        declared: Vec<String>,
    },

    #[error("product `{product}`: module `{module}` attached twice with different instances")]
    DuplicateModule { module: String, product: String },

    #[error("loading module `{module}` for product `{product}` failed: {message}")]
    LoadFailure {
        module: String,
        product: String,
        message: String,
    },

    #[error("product `{product}` depends on failed product `{dependency}`")]
    DependencyFailed {
        dependency: String,
        product: String,
    },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::MissingDependency {
                dependency,
                product,
            } => Diagnostic::error(format!("missing dependency `{}`", dependency))
                .with_context(format!("required by product `{}`", product))
                .with_suggestion(format!(
                    "Check that `{}` names an existing module or product",
                    dependency
                ))
                .with_suggestion("Register a module provider that can supply it".to_string()),

            ResolveError::CyclicDependency { products } => {
                Diagnostic::error("cyclic dependency between products")
                    .with_context(format!("stuck products: {}", products.join(" -> ")))
                    .with_suggestion(
                        "Break the cycle by removing one product-to-product dependency"
                            .to_string(),
                    )
            }

            ResolveError::UnknownParameter {
                parameter,
                module,
                product,
                declared,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "module `{}` declares no parameter `{}`",
                    module, parameter
                ))
                .with_context(format!("set by product `{}`", product));

                if !declared.is_empty() {
                    diag = diag.with_context(format!(
                        "declared parameters: {}",
                        declared.join(", ")
                    ));
                }

                diag.with_suggestion(format!(
                    "Fix the parameter name in the dependency on `{}`",
                    module
                ))
            }

            ResolveError::DuplicateModule { module, product } => {
                Diagnostic::error(format!("module `{}` attached twice", module))
                    .with_context(format!("in product `{}`", product))
                    .with_suggestion(
                        "Set `multiplex = true` on the dependency if both instances are intended"
                            .to_string(),
                    )
            }

            ResolveError::LoadFailure {
                module,
                product,
                message,
            } => Diagnostic::error(format!("failed to load module `{}`", module))
                .with_context(format!("requested by product `{}`", product))
                .with_context(message.clone()),

            ResolveError::DependencyFailed {
                dependency,
                product,
            } => Diagnostic::error(format!(
                "product `{}` depends on failed product `{}`",
                product, dependency
            ))
            .with_suggestion(format!("Fix the failure in `{}` first", dependency)),

            ResolveError::Cancelled => Diagnostic::warning("resolution cancelled"),
        }
    }

    /// Structured report form for miette-based frontends, where one exists
    /// for this error kind.
    pub fn to_report(&self) -> Option<miette::Report> {
        match self {
            ResolveError::CyclicDependency { products } => {
                Some(miette::Report::new(CyclicDependencyReport {
                    products: products.clone(),
                }))
            }
            ResolveError::UnknownParameter {
                parameter,
                module,
                declared,
                ..
            } => Some(miette::Report::new(UnknownParameterReport {
                module: module.clone(),
                parameter: parameter.clone(),
                declared: if declared.is_empty() {
                    None
                } else {
                    Some(format!("declared parameters: {}", declared.join(", ")))
                },
            })),
            _ => None,
        }
    }
}
