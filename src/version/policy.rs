//! Policy gate: turns a selection into a final manifest or a user-facing error

use crate::config::PickOptions;
use crate::version::cutoff::display_instant;
use crate::version::error::ResolveError;
use crate::version::packument::{Manifest, Packument};
use crate::version::selector::select;

/// Select and gate in one step
pub fn pick_manifest(
    packument: &Packument,
    wanted: &str,
    opts: &PickOptions,
) -> Result<Manifest, ResolveError> {
    let selected = select(packument, wanted, opts)?;
    finalize(selected, packument, wanted, opts)
}

/// Accept a selection unless it is missing or policy-restricted
pub fn finalize(
    selected: Option<Manifest>,
    packument: &Packument,
    wanted: &str,
    opts: &PickOptions,
) -> Result<Manifest, ResolveError> {
    let forbidden = match selected {
        Some(manifest) if !packument.is_restricted(&manifest.version) => return Ok(manifest),
        Some(_) => true,
        None => false,
    };

    let mut package = format!("{}@{}", packument.name, wanted);
    if let Some(before) = &opts.before {
        package.push_str(&format!(" with a date before {}", display_instant(before)));
    }

    if forbidden {
        Err(ResolveError::PolicyViolation {
            package,
            message: packument.restriction_message().to_string(),
        })
    } else {
        Err(ResolveError::NoMatchingVersion(package))
    }
}
