// SPDX-License-Identifier: GPL-2.0

//! Random numbers.
//!
//! C header: [`include/linux/random.h`](../../../../include/linux/random.h)
//!
//! Backed by the host's CSPRNG, so there is no seed and no reproducibility.

use crate::{code::EIO, error::KernelResult};

/// Fills `dest` with random bytes generated from the kernel's CSPRNG.
pub fn getrandom(dest: &mut [u8]) -> KernelResult<()> {
    getrandom::getrandom(dest).map_err(|e| {
        log::error!("getrandom failed: {}", e);
        EIO
    })
}

/// Returns a random `u32`, like `get_random_u32()`.
pub fn get_random_u32() -> KernelResult<u32> {
    let mut bytes = [0u8; 4];
    getrandom(&mut bytes)?;
    Ok(u32::from_ne_bytes(bytes))
}

/// Returns a random integer in the interval `[0, ceil)` with uniform
/// distribution, like `get_random_u32_below()`.
///
/// Uses Lemire's multiply-shift with rejection, so no value is favoured over
/// another. A `ceil` of 0 or 1 always yields 0.
pub fn get_random_u32_below(ceil: u32) -> KernelResult<u32> {
    if ceil <= 1 {
        return Ok(0);
    }
    let mut mult = u64::from(get_random_u32()?) * u64::from(ceil);
    if (mult as u32) < ceil {
        let bound = ceil.wrapping_neg() % ceil;
        while (mult as u32) < bound {
            mult = u64::from(get_random_u32()?) * u64::from(ceil);
        }
    }
    Ok((mult >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_stays_in_range() {
        for ceil in [2u32, 3, 7, 10, 1000, u32::MAX] {
            for _ in 0..200 {
                assert!(get_random_u32_below(ceil).unwrap() < ceil);
            }
        }
    }

    #[test]
    fn degenerate_ceilings() {
        assert_eq!(get_random_u32_below(0).unwrap(), 0);
        assert_eq!(get_random_u32_below(1).unwrap(), 0);
    }

    #[test]
    fn every_value_is_reachable() {
        let mut seen = [false; 4];
        for _ in 0..1000 {
            seen[get_random_u32_below(4).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn fills_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        getrandom(&mut a).unwrap();
        getrandom(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
