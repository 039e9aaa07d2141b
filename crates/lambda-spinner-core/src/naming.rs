//! Names of synthesized units.
//!
//! A simple name is `<caller internal name>$$Lambda`; the loader makes it
//! unique when defining the hidden class. A stable name appends a 64-bit
//! fingerprint of the call-site inputs so the same site gets the same name in
//! every run. Stable names are not guaranteed unique: two sites whose inputs
//! mask to the same streams collide, and consumers must tolerate that.

use lambda_types::{CallSiteSpec, CallerClass};

use crate::config::SpinnerConfig;

const MASK1: u16 = 0b1010_1010;
const MASK2: u16 = 0b0101_0101;

/// `<caller>$$Lambda`, using `_` for the `/` in hidden caller names.
pub fn simple_name(caller: &CallerClass) -> String {
    let name = if caller.hidden {
        caller.name.replace('/', "_")
    } else {
        caller.name.clone()
    };
    format!("{}$$Lambda", name.replace('.', "/"))
}

/// Simple name plus the lowercase hex fingerprint of the site.
pub fn stable_name(site: &CallSiteSpec) -> String {
    format!("{}{:x}", simple_name(&site.caller), fingerprint(site))
}

/// Name for the site under the given configuration.
pub fn unit_name(site: &CallSiteSpec, config: &SpinnerConfig) -> String {
    if config.generate_stable_names {
        stable_name(site)
    } else {
        simple_name(&site.caller)
    }
}

/// 64-bit fingerprint: `crc32(stream1) | crc32(stream2) << 32`.
///
/// The inputs are folded in a fixed order; changing the order or the
/// rendering of any input changes every stable name.
pub fn fingerprint(site: &CallSiteSpec) -> u64 {
    let mut streams = MaskedStreams::default();
    streams.append(&site.interface_method_name);
    streams.append(&site.factory_type.qualified_signature());
    streams.append(&site.interface_method_type.qualified_signature());
    streams.append(&site.implementation.member_name());
    streams.append(&site.dynamic_method_type.qualified_signature());
    for alt in &site.alt_interfaces {
        streams.append(&alt.binary_name());
    }
    for alt in &site.alt_methods {
        streams.append(&alt.qualified_signature());
    }
    streams.finish()
}

#[derive(Default)]
struct MaskedStreams {
    first: String,
    second: String,
}

impl MaskedStreams {
    /// Mask every UTF-16 code unit of `data` into both streams.
    fn append(&mut self, data: &str) {
        for unit in data.encode_utf16() {
            // Masked units are below 0x100 and always valid chars.
            self.first.push(char::from((unit & MASK1) as u8));
            self.second.push(char::from((unit & MASK2) as u8));
        }
    }

    fn finish(self) -> u64 {
        let low = u64::from(crc32fast::hash(self.first.as_bytes()));
        let high = u64::from(crc32fast::hash(self.second.as_bytes()));
        low | high << 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_types::{FunctionalInterface, ImplMethod, InvocationKind, MethodType};

    fn int_function_site() -> CallSiteSpec {
        CallSiteSpec::new(
            CallerClass::new("com.acme.Main"),
            FunctionalInterface::new("java/util/function/IntFunction"),
            "apply",
            MethodType::parse_descriptor("(I)Ljava/lang/Object;").unwrap(),
            vec![],
            ImplMethod::new(
                "java/lang/String",
                "valueOf",
                MethodType::parse_descriptor("(I)Ljava/lang/String;").unwrap(),
                InvocationKind::Static,
            ),
        )
        .with_dynamic_method_type(MethodType::parse_descriptor("(I)Ljava/lang/String;").unwrap())
    }

    #[test]
    fn test_simple_names() {
        assert_eq!(
            simple_name(&CallerClass::new("com.acme.Main")),
            "com/acme/Main$$Lambda"
        );
        assert_eq!(
            simple_name(&CallerClass::new("com.acme.Outer$Inner")),
            "com/acme/Outer$Inner$$Lambda"
        );
        assert_eq!(
            simple_name(&CallerClass::hidden("com.acme.Proxy/0x0000000801001c00")),
            "com/acme/Proxy_0x0000000801001c00$$Lambda"
        );
    }

    #[test]
    fn test_fingerprint_known_value() {
        let site = int_function_site();
        assert_eq!(fingerprint(&site), 0x7cb4_d922_4b63_c910);
        assert_eq!(stable_name(&site), "com/acme/Main$$Lambda7cb4d9224b63c910");
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_input_sensitive() {
        let site = int_function_site();
        assert_eq!(fingerprint(&site), fingerprint(&site.clone()));

        let with_alt = site
            .clone()
            .with_alt_interface(FunctionalInterface::serializable("java/io/Serializable"));
        assert_eq!(fingerprint(&with_alt), 0xb25a_e0c0_ac62_d2fe);

        let renamed = CallSiteSpec {
            interface_method_name: "applyAsObject".into(),
            ..site
        };
        assert_ne!(fingerprint(&renamed), 0x7cb4_d922_4b63_c910);
    }

    #[test]
    fn test_caller_does_not_enter_fingerprint() {
        let site = int_function_site();
        let other = CallSiteSpec {
            caller: CallerClass::new("org.other.App"),
            ..site.clone()
        };
        assert_eq!(fingerprint(&site), fingerprint(&other));
        assert_ne!(stable_name(&site), stable_name(&other));
    }

    #[test]
    fn test_unit_name_follows_config() {
        let site = int_function_site();
        assert_eq!(
            unit_name(&site, &SpinnerConfig::default()),
            "com/acme/Main$$Lambda"
        );
        assert_eq!(
            unit_name(&site, &SpinnerConfig::default().with_stable_names(true)),
            stable_name(&site)
        );
    }
}
