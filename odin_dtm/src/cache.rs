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

use std::{collections::HashMap, fs, path::{Path,PathBuf}, sync::{Arc,Mutex,Weak}};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::{OutputLayout, RequestKey, errors::{Result,assembly_error}};

/// held while a (date,altitude) result is computed
pub type KeyGuard = OwnedMutexGuard<()>;

/// the store of final workflow archives, keyed by (date,altitude).
///
/// A key is either Done (archive present) or not. Computations of the same key are serialized
/// through [`WorkflowCache::lock`], callers have to re-check with `get` after acquiring the lock
pub struct WorkflowCache {
    layout: OutputLayout,
    locks: Mutex<HashMap<RequestKey,Weak<AsyncMutex<()>>>>,
}

impl WorkflowCache {
    pub fn new (layout: OutputLayout)->Self {
        WorkflowCache { layout, locks: Mutex::new( HashMap::new()) }
    }

    /// the final archive for `key` if it was already computed
    pub fn get (&self, key: &RequestKey)->Option<PathBuf> {
        let path = self.layout.final_archive( key);
        if path.is_file() { Some(path) } else { None }
    }

    /// publish a staged archive as the result for `key`
    pub fn put (&self, key: &RequestKey, staged: &Path)->Result<PathBuf> {
        let path = self.layout.final_archive( key);
        fs::rename( staged, &path).map_err( |e| assembly_error!("cannot publish {:?}: {}", path, e))?;
        debug!("stored {:?}", path);
        Ok(path)
    }

    /// acquire the per-key lock. Locks of keys nobody holds anymore are dropped
    pub async fn lock (&self, key: &RequestKey)->KeyGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else( |e| e.into_inner());
            locks.retain( |_,w| w.strong_count() > 0);

            match locks.get( key).and_then( |w| w.upgrade()) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new( AsyncMutex::new(()));
                    locks.insert( *key, Arc::downgrade( &mutex));
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }

    /// number of keys that are currently locked or waited for
    pub fn active_locks (&self)->usize {
        let locks = self.locks.lock().unwrap_or_else( |e| e.into_inner());
        locks.values().filter( |w| w.strong_count() > 0).count()
    }
}
