use std::collections::HashMap;

use log::{debug, warn};

use crate::bank::{Sample, SoundBank};
use crate::descriptor::{MetaDescriptor, SoundDirective};

/// Rewrite every unresolved directive whose temp address matches a bank
/// sample into a resolved bank reference.
///
/// When several samples share an address the first one in
/// [`SoundBank::samples`] order wins. Directives without a match are left
/// unresolved. Returns the number of directives resolved.
pub fn resolve(descriptor: &mut MetaDescriptor, bank: &SoundBank) -> usize {
    let mut by_address: HashMap<u32, &Sample> = HashMap::new();
    for sample in bank.samples() {
        by_address.entry(sample.address).or_insert(sample);
    }

    let mut resolved = 0;
    for (id, directive) in descriptor.directives.iter_mut() {
        let SoundDirective::Unresolved { temp_address } = *directive else {
            continue;
        };
        match by_address.get(&temp_address) {
            Some(sample) => {
                *directive = SoundDirective::Resolved {
                    instrument_type: sample.owner.instrument_type(),
                    list_index: sample.owner.index(),
                    key_region: sample.owner.key_region(),
                };
                debug!("resolved {id} at {temp_address:#X} to {directive:?}");
                resolved += 1;
            }
            None => warn!("no bank sample at {temp_address:#X} for {id}, leaving it unresolved"),
        }
    }
    resolved
}
