//! Method types: parameter list plus return type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::java_type::{JavaType, TypeParseError};

/// A JVM method type, e.g. `(ILjava/lang/String;)J`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodType {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodType {
    pub fn new(params: Vec<JavaType>, ret: JavaType) -> Self {
        Self { params, ret }
    }

    /// `()V`
    pub fn void() -> Self {
        Self::new(Vec::new(), JavaType::Void)
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, index: usize) -> Option<&JavaType> {
        self.params.get(index)
    }

    /// Total local-variable slots used by the parameters (longs/doubles take two).
    pub fn parameter_slots(&self) -> u16 {
        self.params.iter().map(JavaType::slot_size).sum()
    }

    pub fn with_return(&self, ret: JavaType) -> Self {
        Self::new(self.params.clone(), ret)
    }

    pub fn insert_parameter(&self, index: usize, ty: JavaType) -> Self {
        let mut params = self.params.clone();
        params.insert(index.min(params.len()), ty);
        Self::new(params, self.ret.clone())
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for p in &self.params {
            out.push_str(&p.descriptor());
        }
        out.push(')');
        out.push_str(&self.ret.descriptor());
        out
    }

    /// Parameter and return types by binary name: `(int,java.lang.String)long`.
    pub fn qualified_signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(JavaType::binary_name).collect();
        format!("({}){}", params.join(","), self.ret.binary_name())
    }

    /// Parameter and return types by simple name: `(int,String)long`.
    pub fn simple_signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(JavaType::simple_name).collect();
        format!("({}){}", params.join(","), self.ret.simple_name())
    }

    pub fn parse_descriptor(input: &str) -> Result<Self, TypeParseError> {
        let mut rest = input
            .strip_prefix('(')
            .ok_or_else(|| TypeParseError::new(input, "method descriptor must start with '('"))?;
        let mut params = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            let (ty, after) = JavaType::parse_prefix(rest, input)?;
            if ty.is_void() {
                return Err(TypeParseError::new(input, "void parameter"));
            }
            params.push(ty);
            rest = after;
        }
        let ret = JavaType::parse_descriptor(rest)
            .map_err(|e| TypeParseError::new(input, format!("bad return type: {}", e.reason)))?;
        Ok(Self::new(params, ret))
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl TryFrom<String> for MethodType {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MethodType::parse_descriptor(&value)
    }
}

impl From<MethodType> for String {
    fn from(value: MethodType) -> Self {
        value.descriptor()
    }
}
