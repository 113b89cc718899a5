//! Applying a configuration to class bytes.

use fgk_classfile::{inner_classes, ClassFile};
use tracing::trace;

use crate::error::Result;
use crate::AtConfig;

impl AtConfig {
    /// Rewrites the access flags of `bytes` according to this configuration
    /// and returns the re-encoded class. Classes no rule touches come back
    /// unchanged (but re-encoded); use [`AtConfig::targets_class`] to skip
    /// them without parsing.
    pub fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut class = ClassFile::parse(bytes)?;
        let name = class.name()?.to_owned();

        if let Some(change) = self.class_change(&name) {
            trace!(class = %name, "widening class access");
            class.access = change.apply(class.access);
            rewrite_inner_entry(&mut class, &name)?;
        }

        let pool = &class.pool;
        for field in &mut class.fields {
            let field_name = field.name(pool)?;
            if let Some(change) = self.field_change(&name, field_name) {
                trace!(class = %name, field = field_name, "widening field access");
                field.access = change.apply(field.access);
            }
        }
        for method in &mut class.methods {
            let key = method.key(pool)?;
            if let Some(change) = self.method_change(&name, &key) {
                trace!(class = %name, method = %key, "widening method access");
                method.access = change.apply(method.access);
            }
        }

        Ok(class.to_bytes()?)
    }
}

/// The access recorded for a nested class lives in its own flag word and in
/// the `InnerClasses` row of every class that mentions it. Keep the row for
/// the class itself in sync with the new flags.
fn rewrite_inner_entry(class: &mut ClassFile, name: &str) -> Result<()> {
    let Some(index) = class.attribute(inner_classes::ATTRIBUTE_NAME) else {
        return Ok(());
    };
    let mut entries = inner_classes::parse(&class.pool, &class.attributes[index])?;
    let mut touched = false;
    for entry in &mut entries {
        if entry.inner == name {
            entry.access = class.access;
            touched = true;
        }
    }
    if touched {
        class.attributes[index] = inner_classes::encode(&mut class.pool, &entries)?;
    }
    Ok(())
}
