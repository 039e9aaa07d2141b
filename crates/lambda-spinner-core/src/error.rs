//! Errors reported by the lambda creation call.

/// Failure of a lambda creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaConversionError {
    /// The creation-call inputs are malformed or mutually incompatible.
    ContractViolation {
        /// `interface.method` being implemented
        interface_method: String,
        /// What is wrong
        reason: String,
        /// Signatures involved, rendered as descriptors
        signatures: Vec<String>,
    },

    /// The unit was defined but could not be linked into a call site:
    /// constructor or static getter missing, or eager instantiation failed.
    Linkage {
        /// Synthesized unit name
        unit: String,
        reason: String,
    },

    /// Emission or definition failed after the inputs were validated.
    ///
    /// This indicates a bug in the spinner or the loader; callers must not
    /// continue linking the site.
    InternalEmission {
        /// Synthesized unit name, if one was assigned
        unit: String,
        reason: String,
    },
}

impl LambdaConversionError {
    pub fn contract(
        interface_method: impl Into<String>,
        reason: impl Into<String>,
        signatures: Vec<String>,
    ) -> Self {
        LambdaConversionError::ContractViolation {
            interface_method: interface_method.into(),
            reason: reason.into(),
            signatures,
        }
    }

    pub fn linkage(unit: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LambdaConversionError::Linkage {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }

    pub fn internal(unit: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LambdaConversionError::InternalEmission {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure is an internal invariant violation rather than a
    /// rejection of the caller's inputs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LambdaConversionError::InternalEmission { .. })
    }
}

impl std::fmt::Display for LambdaConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LambdaConversionError::ContractViolation {
                interface_method,
                reason,
                signatures,
            } => {
                write!(f, "LambdaConversionException: {}: {}", interface_method, reason)?;
                if !signatures.is_empty() {
                    write!(f, " [{}]", signatures.join(", "))?;
                }
                Ok(())
            }
            LambdaConversionError::Linkage { unit, reason } => {
                write!(f, "LambdaConversionException: linking {}: {}", unit, reason)
            }
            LambdaConversionError::InternalEmission { unit, reason } => {
                write!(f, "InternalError: emitting {}: {}", unit, reason)
            }
        }
    }
}

impl std::error::Error for LambdaConversionError {}
