use super::record::{
    normalize_client_platforms, normalize_side, validate_client_platforms, validate_side,
    MetaRecord, ModOption,
};
use crate::core::error::PackResult;

/// A set of in-place edits to a metadata record. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct RecordChanges {
    pub side: Option<String>,
    pub pin: Option<bool>,
    pub disabled_client_platforms: Option<Vec<String>>,
    pub optional: Option<bool>,
    pub optional_description: Option<String>,
    pub optional_default: Option<bool>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.side.is_none()
            && self.pin.is_none()
            && self.disabled_client_platforms.is_none()
            && !self.touches_option()
    }

    fn touches_option(&self) -> bool {
        self.optional.is_some()
            || self.optional_description.is_some()
            || self.optional_default.is_some()
    }

    /// Validate every requested edit, then apply them all.
    ///
    /// Returns one human readable line per change. Nothing is applied when
    /// any value fails validation.
    pub fn apply(&self, record: &mut MetaRecord) -> PackResult<Vec<String>> {
        if let Some(side) = &self.side {
            validate_side(side)?;
        }
        if let Some(platforms) = &self.disabled_client_platforms {
            validate_client_platforms(platforms)?;
        }

        let mut log = Vec::new();

        if let Some(side) = &self.side {
            let old = if record.side.is_empty() {
                "both".to_string()
            } else {
                record.side.clone()
            };
            record.side = normalize_side(side);
            log.push(format!("Changed side from '{}' to '{}'", old, record.side));
        }

        if let Some(platforms) = &self.disabled_client_platforms {
            let normalized = normalize_client_platforms(platforms);
            let old = std::mem::replace(
                &mut record.download.disabled_client_platforms,
                normalized.clone(),
            );
            if normalized.is_empty() {
                log.push(format!("Cleared disabled client platforms (was {old:?})"));
            } else {
                log.push(format!(
                    "Changed disabled client platforms from {old:?} to {normalized:?}"
                ));
            }
        }

        if let Some(pin) = self.pin {
            let old = std::mem::replace(&mut record.pin, pin);
            if pin {
                log.push(format!("Pinned mod (was {old})"));
            } else {
                log.push(format!("Unpinned mod (was {old})"));
            }
        }

        if self.touches_option() {
            let option = record.option.get_or_insert_with(ModOption::default);
            if let Some(optional) = self.optional {
                let old = std::mem::replace(&mut option.optional, optional);
                log.push(format!("Changed optional status from {old} to {optional}"));
            }
            if let Some(description) = &self.optional_description {
                let old = std::mem::replace(&mut option.description, description.clone());
                log.push(format!(
                    "Changed optional description from '{old}' to '{description}'"
                ));
            }
            if let Some(default) = self.optional_default {
                let old = std::mem::replace(&mut option.default, default);
                log.push(format!("Changed optional default from {old} to {default}"));
            }
            if record.normalize_option() {
                log.push("Removed optional settings (all values were default)".into());
            }
        }

        Ok(log)
    }
}
