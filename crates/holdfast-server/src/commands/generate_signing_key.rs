/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Implementation of the `admin generate-signing-key` command.

use anyhow::{Context, Result};
use holdfast::TokenSigner;
use std::time::Duration;

/// Prints a fresh upload signing key seed and its public key.
pub fn run() -> Result<()> {
    let signer = TokenSigner::generate(Duration::from_secs(3600))
        .context("Failed to generate signing key")?;

    println!("upload_signing_key = \"{}\"", signer.seed_base64());
    println!();
    print!("{}", signer.verifier().public_key_pem());
    Ok(())
}
