//! The inputs of a single lambda creation call.

use serde::{Deserialize, Serialize};

use crate::java_type::JavaType;
use crate::member::{CallerClass, FunctionalInterface, ImplMethod};
use crate::method_type::MethodType;

/// Everything the metafactory receives at one lambda creation site.
///
/// The parameters of `factory_type` are the captured values; its return type
/// names the functional interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSiteSpec {
    pub caller: CallerClass,
    pub interface_method_name: String,
    pub factory_type: MethodType,
    pub interface: FunctionalInterface,
    pub interface_method_type: MethodType,
    pub implementation: ImplMethod,
    pub dynamic_method_type: MethodType,
    #[serde(default)]
    pub serializable: bool,
    #[serde(default)]
    pub alt_interfaces: Vec<FunctionalInterface>,
    #[serde(default)]
    pub alt_methods: Vec<MethodType>,
}

impl CallSiteSpec {
    /// A non-serializable site without bridges whose dynamic type equals the
    /// interface method type.
    pub fn new(
        caller: CallerClass,
        interface: FunctionalInterface,
        interface_method_name: impl Into<String>,
        interface_method_type: MethodType,
        captured: Vec<JavaType>,
        implementation: ImplMethod,
    ) -> Self {
        let factory_type = MethodType::new(captured, interface.as_type());
        Self {
            caller,
            interface_method_name: interface_method_name.into(),
            factory_type,
            interface,
            dynamic_method_type: interface_method_type.clone(),
            interface_method_type,
            implementation,
            serializable: false,
            alt_interfaces: Vec::new(),
            alt_methods: Vec::new(),
        }
    }

    pub fn with_dynamic_method_type(mut self, dynamic: MethodType) -> Self {
        self.dynamic_method_type = dynamic;
        self
    }

    pub fn with_serializable(mut self, serializable: bool) -> Self {
        self.serializable = serializable;
        self
    }

    pub fn with_alt_interface(mut self, alt: FunctionalInterface) -> Self {
        self.alt_interfaces.push(alt);
        self
    }

    pub fn with_alt_method(mut self, alt: MethodType) -> Self {
        self.alt_methods.push(alt);
        self
    }

    pub fn capture_arity(&self) -> usize {
        self.factory_type.parameter_count()
    }

    pub fn captured_types(&self) -> &[JavaType] {
        &self.factory_type.params
    }

    /// Whether any implemented interface makes the class serializable even
    /// though the site did not ask for it.
    pub fn is_accidentally_serializable(&self) -> bool {
        !self.serializable
            && (self.interface.serializable || self.alt_interfaces.iter().any(|i| i.serializable))
    }
}
