// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    validation = { EngineError::Validation("bad".to_string()), EXIT_VALIDATION },
    timeout    = { EngineError::Timeout("slow".to_string()), EXIT_TIMEOUT },
    not_found  = { EngineError::NotFound("x".to_string()), EXIT_FAILURE },
    fatal      = { EngineError::Fatal("boom".to_string()), EXIT_FAILURE },
)]
fn engine_errors_map_to_exit_codes(error: EngineError, expected: i32) {
    assert_eq!(ExitError::from(error).code, expected);
}

#[test]
fn storage_validation_maps_to_validation_code() {
    let error = cpost_storage::StorageError::Validation("nope".to_string());
    assert_eq!(ExitError::from(error).code, EXIT_VALIDATION);
}
