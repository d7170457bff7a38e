use crate::bus::BusContext;
use log::debug;
use m2k_types::DeviceKind;
use std::collections::BTreeSet;

/// The scopes a context has to expose to be claimed by a kind, checked in this order.
pub const SIGNATURES: [(DeviceKind, &[&str]); 2] = [
    (
        DeviceKind::FmComms,
        &["cf-ad9361-lpc", "cf-ad9361-dds-core-lpc", "ad9361-phy"],
    ),
    (
        DeviceKind::M2k,
        &[
            "m2k-adc",
            "m2k-dac-a",
            "m2k-dac-b",
            "m2k-logic-analyzer-rx",
            "m2k-logic-analyzer-tx",
            "m2k-logic-analyzer",
        ],
    ),
];

pub fn classify(context: &dyn BusContext) -> DeviceKind {
    let kind = classify_scopes(&context.scopes());
    debug!("{} classified as {}", context.uri(), kind);
    kind
}

/// First kind whose whole signature is present wins, anything else is generic.
pub fn classify_scopes(scopes: &BTreeSet<String>) -> DeviceKind {
    SIGNATURES
        .iter()
        .find(|(_, required)| required.iter().all(|scope| scopes.contains(*scope)))
        .map(|(kind, _)| *kind)
        .unwrap_or(DeviceKind::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::simulated::SimulatedInstrument;
    use m2k_types::FirmwareVersion;
    use proptest::prelude::*;
    use proptest::sample::subsequence;

    fn scopes(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn signature(kind: DeviceKind) -> &'static [&'static str] {
        SIGNATURES
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, required)| *required)
            .unwrap_or(&[])
    }

    #[test]
    fn m2k_scope_set() {
        let available = scopes(&[
            "m2k-adc",
            "m2k-dac-a",
            "m2k-dac-b",
            "m2k-logic-analyzer-rx",
            "m2k-logic-analyzer-tx",
            "m2k-logic-analyzer",
        ]);
        assert_eq!(classify_scopes(&available), DeviceKind::M2k);
    }

    #[test]
    fn one_missing_scope_is_generic() {
        let available = scopes(&[
            "m2k-adc",
            "m2k-dac-a",
            "m2k-logic-analyzer-rx",
            "m2k-logic-analyzer-tx",
            "m2k-logic-analyzer",
        ]);
        assert_eq!(classify_scopes(&available), DeviceKind::Generic);
        assert_eq!(classify_scopes(&BTreeSet::new()), DeviceKind::Generic);
    }

    #[test]
    fn earlier_signature_wins() {
        let mut available = scopes(signature(DeviceKind::M2k));
        available.extend(scopes(signature(DeviceKind::FmComms)));
        assert_eq!(classify_scopes(&available), DeviceKind::FmComms);
    }

    #[test]
    fn live_contexts() {
        let m2k = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26).into_context();
        assert_eq!(classify(&m2k), DeviceKind::M2k);

        let fmcomms = SimulatedInstrument::fmcomms("ip:192.168.2.1").into_context();
        assert_eq!(classify(&fmcomms), DeviceKind::FmComms);

        let partial = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26)
            .without_scope("m2k-dac-b")
            .into_context();
        assert_eq!(classify(&partial), DeviceKind::Generic);
    }

    fn universe() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = SIGNATURES
            .iter()
            .flat_map(|(_, required)| required.iter().copied())
            .collect();
        names.extend(["m2k-fabric", "m2k-adc-trigger", "xadc", "ad7291"]);
        names
    }

    proptest! {
        #[test]
        fn classification_matches_first_satisfied_signature(
            chosen in subsequence(universe(), 0..=universe().len())
        ) {
            let available = scopes(&chosen);
            let satisfied = |kind: DeviceKind| {
                signature(kind).iter().all(|scope| available.contains(*scope))
            };

            let kind = classify_scopes(&available);
            let position = SIGNATURES.iter().position(|(candidate, _)| *candidate == kind);
            match position {
                Some(position) => {
                    prop_assert!(satisfied(kind));
                    for (earlier, _) in &SIGNATURES[..position] {
                        prop_assert!(!satisfied(*earlier));
                    }
                }
                None => {
                    prop_assert_eq!(kind, DeviceKind::Generic);
                    for (candidate, _) in &SIGNATURES {
                        prop_assert!(!satisfied(*candidate));
                    }
                }
            }
        }

        #[test]
        fn unrelated_scopes_never_change_the_result(
            extra in proptest::collection::btree_set("[a-z]{3,8}-x", 0..6),
            with_m2k in any::<bool>(),
        ) {
            let mut available: BTreeSet<String> = extra;
            if with_m2k {
                available.extend(scopes(signature(DeviceKind::M2k)));
            }

            let expected = if with_m2k { DeviceKind::M2k } else { DeviceKind::Generic };
            prop_assert_eq!(classify_scopes(&available), expected);
        }
    }
}
