/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use thiserror::Error;
use chrono::NaiveDate;

pub type Result<T> = std::result::Result<T,OdinDtmError>;

#[derive(Error,Debug)]
pub enum OdinDtmError {
    /// bad date or altitude - caller problem, never retried
    #[error("input validation error: {0}")]
    InputValidation(String),

    /// historical index table unreachable or malformed
    #[error("index fetch error: {0}")]
    FetchError(String),

    #[error("no index record for {0}")]
    MissingRecord(NaiveDate),

    #[error("dispatch error for run {key}: {msg}")]
    DispatchError { key: String, msg: String },

    #[error("result error for run {key}: {msg}")]
    ResultError { key: String, msg: String },

    #[error("assembly error: {0}")]
    AssemblyError(String),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("JSON error {0}")]
    JsonError( #[from] serde_json::Error),

    #[error("config RON error {0}")]
    RonError( #[from] ron::error::SpannedError),

    #[error("http error {0}")]
    HttpError( #[from] reqwest::Error),

    #[error("zip error {0}")]
    ZipError( #[from] zip::result::ZipError),

    #[error("operation failed {0}")]
    OpFailedError(String)
}

impl OdinDtmError {
    /// true if this is a caller error that should be reported as such (not as internal failure)
    pub fn is_client_error (&self)->bool {
        matches!( self, OdinDtmError::InputValidation(_))
    }
}

macro_rules! input_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::InputValidation( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use input_error;

macro_rules! fetch_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::FetchError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use fetch_error;

macro_rules! dispatch_error {
    ($key:expr, $fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::DispatchError{ key: $key.to_string(), msg: format!( $fmt $(, $arg)* ) }
    };
}
pub (crate) use dispatch_error;

macro_rules! result_error {
    ($key:expr, $fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::ResultError{ key: $key.to_string(), msg: format!( $fmt $(, $arg)* ) }
    };
}
pub (crate) use result_error;

macro_rules! assembly_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::AssemblyError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use assembly_error;

macro_rules! op_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::OdinDtmError::OpFailedError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use op_failed;
