//! Native symbol mangling
//!
//! Short form: `Java_<holder>_<name>`. Long form, for overloaded natives:
//! `Java_<holder>_<name>__<parameter descriptors>`.

use super::descriptor::NativeMethod;

/// Prefix shared by every mangled native symbol
pub const SYMBOL_PREFIX: &str = "Java_";

/// Escape a name fragment so it is a valid C identifier suffix
pub fn mangle(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(c),
            '/' | '.' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            other => {
                let mut units = [0u16; 2];
                for unit in other.encode_utf16(&mut units) {
                    out.push_str(&format!("_0{:04x}", unit));
                }
            }
        }
    }
    out
}

/// `Java_<holder>_<name>`
pub fn short_name(method: &NativeMethod) -> String {
    format!(
        "{}{}_{}",
        SYMBOL_PREFIX,
        mangle(method.holder.binary_name()),
        mangle(&method.name)
    )
}

/// Short name followed by `__` and the mangled parameter descriptors
pub fn long_name(method: &NativeMethod) -> String {
    format!(
        "{}__{}",
        short_name(method),
        mangle(&method.signature.parameters_text())
    )
}

/// Both candidate symbols, in lookup order
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SymbolNames {
    pub short: String,
    pub long: String,
}

impl SymbolNames {
    pub fn for_method(method: &NativeMethod) -> Self {
        Self {
            short: short_name(method),
            long: long_name(method),
        }
    }

    pub fn candidates(&self) -> [&str; 2] {
        [&self.short, &self.long]
    }
}
