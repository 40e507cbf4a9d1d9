//! Property tests over random geometries, keys and volumes.

use decvol_core::{CipherVariant, OperationParameters};
use decvol_crypto::{BlockCipherKey, CounterState, DecMode};
use proptest::prelude::*;

type Volume = (CipherVariant, OperationParameters, [u8; 32], Vec<u8>);

fn power_of_two() -> impl Strategy<Value = u64> {
    prop::sample::select(vec![1u64, 2, 4])
}

/// Random valid geometry for either cipher together with a key and plaintext.
fn volume() -> impl Strategy<Value = Volume> {
    (
        any::<bool>(),
        power_of_two(),
        power_of_two(),
        power_of_two(),
        1u64..=4,
    )
        .prop_flat_map(|(wide, w, s, q, v)| {
            let variant = if wide {
                CipherVariant::Wide
            } else {
                CipherVariant::Narrow
            };
            let l = q * variant.block_width() as u64;
            let params = OperationParameters::new(w, s, v, l);
            let len = (w * s * l) as usize;
            (
                Just(variant),
                Just(params),
                any::<[u8; 32]>(),
                proptest::collection::vec(any::<u8>(), len),
            )
        })
}

proptest! {
    /// Decrypting with the counters left by the last encrypt recovers the plaintext
    #[test]
    fn encrypt_decrypt_roundtrip((variant, params, key, pt) in volume(), rounds in 1usize..4) {
        let key = BlockCipherKey::from_bytes(variant, key);
        let mode = DecMode::new(&key, &params).unwrap();
        let mut counters = CounterState::new(mode.geometry());

        let mut ct = vec![0u8; pt.len()];
        for _ in 0..rounds {
            mode.encrypt(&pt, &mut ct, &mut counters).unwrap();
        }
        prop_assert!(counters.sector_counters().iter().all(|&c| c == rounds as u64));

        let mut recovered = vec![0u8; pt.len()];
        mode.decrypt(&ct, &mut recovered, &counters).unwrap();
        prop_assert_eq!(recovered, pt);
    }

    /// Rotating any section keeps the volume decryptable under the new counters
    #[test]
    fn rotation_preserves_plaintext(
        (variant, params, key, pt) in volume(),
        pick in any::<prop::sample::Index>(),
    ) {
        let key = BlockCipherKey::from_bytes(variant, key);
        let mode = DecMode::new(&key, &params).unwrap();
        let mut counters = CounterState::new(mode.geometry());
        let section = pick.index(params.sections as usize) as u64;

        let mut data = pt.clone();
        mode.encrypt_in_place(&mut data, &mut counters).unwrap();
        let untouched: Vec<u8> = data.clone();
        mode.reencrypt_section_in_place(&mut data, &mut counters, section).unwrap();

        for j in 0..params.sections {
            if j != section {
                let range = mode.geometry().section_range(j);
                prop_assert_eq!(&data[range.clone()], &untouched[range]);
            }
        }
        prop_assert_eq!(counters.section(section), 1);

        mode.decrypt_in_place(&mut data, &counters).unwrap();
        prop_assert_eq!(data, pt);
    }

    /// Two encryptions of the same plaintext never produce the same ciphertext
    #[test]
    fn keystream_not_reused((variant, params, key, pt) in volume()) {
        let key = BlockCipherKey::from_bytes(variant, key);
        let mode = DecMode::new(&key, &params).unwrap();
        let mut counters = CounterState::new(mode.geometry());

        let mut first = vec![0u8; pt.len()];
        let mut second = vec![0u8; pt.len()];
        mode.encrypt(&pt, &mut first, &mut counters).unwrap();
        mode.encrypt(&pt, &mut second, &mut counters).unwrap();
        prop_assert_ne!(first, second);
    }
}
