// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random identifiers: job ids and application tokens.

use rand::RngCore;

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A fresh job id: 12 random bytes as 24 lowercase hex characters.
pub fn new_jid() -> String {
    random_hex::<12>()
}

/// A fresh application token: 10 random bytes as 20 lowercase hex characters.
pub fn new_token() -> String {
    random_hex::<10>()
}
