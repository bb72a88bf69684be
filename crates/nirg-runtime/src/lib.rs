//! Runtime loader (`spec.md` §4.7 "Runtime"): opens the compiled shared
//! library a model was generated into, allocates every [`Array`] the
//! model's groups need via the [`Backend`] contract, and drives
//! `initialize`/`initializeSparse`/`stepTime`.
//!
//! The loaded [`libloading::Library`] and the `(group, variable) -> Array`
//! map are both owned here (`spec.md` §3 "Ownership lifecycle"); arrays
//! are released in reverse allocation order on drop, followed by the
//! exported `freeMem` and library unload.

pub mod error;

pub use error::{Result, RuntimeError};

use std::collections::HashMap;
use std::path::Path;

use libloading::{Library, Symbol};
use log::debug;

use nirg_backend::{Array, Backend};
use nirg_ir::{ConnectivityInit, ConnectivityKind, Model, NarrowIndexType, NumericType, WeightStorage};
use nirg_storage::RecordingBuffer;

type AllocateMemFn = unsafe extern "C" fn();
type FreeMemFn = unsafe extern "C" fn();
type InitializeFn = unsafe extern "C" fn();
type InitializeSparseFn = unsafe extern "C" fn();
type StepTimeFn = unsafe extern "C" fn(u64, u64);

/// Owns a loaded compiled model and every array allocated for it.
pub struct Runtime {
    library: Library,
    library_path: String,
    arrays: HashMap<(String, String), Array>,
    insertion_order: Vec<(String, String)>,
    timestep: u64,
    num_recording_timesteps: Option<u32>,
}

impl Runtime {
    /// Open the shared library at `path`. Does not allocate or call any
    /// exported entrypoint yet; call [`Runtime::allocate`] next.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let library = unsafe { Library::new(path.as_ref()) }
            .map_err(|source| RuntimeError::LoadFailure { path: path_str.clone(), source })?;
        debug!("loaded runtime library '{path_str}'");
        Ok(Self {
            library,
            library_path: path_str,
            arrays: HashMap::new(),
            insertion_order: Vec::new(),
            timestep: 0,
            num_recording_timesteps: None,
        })
    }

    fn symbol<T>(&self, name: &'static str) -> Result<Symbol<'_, T>> {
        let with_nul = format!("{name}\0");
        unsafe { self.library.get(with_nul.as_bytes()) }
            .map_err(|_| RuntimeError::SymbolMissing { library: self.library_path.clone(), symbol: name.to_string() })
    }

    /// Set the recording-buffer depth (`spec.md` §4.7 `allocate(numRecordingTimesteps?)`).
    /// Must be called before [`Runtime::allocate`] if any group in that
    /// call's `recording_groups` is to have a spike-recording buffer.
    pub fn set_recording_timesteps(&mut self, num_recording_timesteps: u32) {
        self.num_recording_timesteps = Some(num_recording_timesteps);
    }

    fn insert_array(&mut self, group: &str, name: &str, array: Array) -> Result<()> {
        let key = (group.to_string(), name.to_string());
        if self.arrays.contains_key(&key) {
            return Err(RuntimeError::DuplicateArray { group: group.to_string(), name: name.to_string() });
        }
        self.insertion_order.push(key.clone());
        self.arrays.insert(key, array);
        Ok(())
    }

    /// Walk `model` and create every array its groups need (`spec.md`
    /// §4.7 `allocate`), then invoke the exported `allocateMem`.
    /// `recording_groups` names the neuron groups that should additionally
    /// receive a spike-recording buffer; each one requires
    /// [`Runtime::set_recording_timesteps`] to have been called first, or
    /// this fails with [`RuntimeError::RecordingUnset`].
    pub fn allocate(&mut self, model: &Model, backend: &dyn Backend, recording_groups: &[&str]) -> Result<()> {
        for group in recording_groups {
            if self.num_recording_timesteps.is_none() {
                return Err(RuntimeError::RecordingUnset { group: group.to_string() });
            }
        }

        let batch = model.config.batch_size as usize;
        let default_loc = model.config.default_var_location;

        for group in model.neuron_groups() {
            let n = group.num_neurons as usize;
            let slots = group.num_delay_slots as usize;
            self.insert_array(&group.name, "spkCnt", backend.create_array(NumericType::U32, batch * slots, default_loc))?;
            self.insert_array(&group.name, "spk", backend.create_array(NumericType::U32, batch * n * slots, default_loc))?;
            self.insert_array(&group.name, "spkQuePtr", backend.create_array(NumericType::U32, 1, default_loc))?;

            for (flag, array_name) in [
                (group.needs_spike_time, "sT"),
                (group.needs_prev_spike_time, "prevST"),
                (group.needs_spike_event_time, "seT"),
                (group.needs_prev_spike_event_time, "prevSET"),
            ] {
                if flag {
                    self.insert_array(
                        &group.name,
                        array_name,
                        backend.create_array(model.config.time_precision, batch * n * slots, default_loc),
                    )?;
                }
            }

            for var in &group.model.vars {
                let ty = var.ty.unwrap_or(model.config.precision);
                let queued = group.delay_required_vars.contains(&var.name);
                let count = if queued { batch * n * slots } else { batch * n };
                let loc = group.var_location(&var.name, default_loc);
                self.insert_array(&group.name, &var.name, backend.create_array(ty, count, loc))?;
            }

            if recording_groups.contains(&group.name.as_str()) {
                let num_timesteps = self.num_recording_timesteps.expect("checked above");
                let words = RecordingBuffer::new(group.num_neurons, model.config.batch_size, num_timesteps).word_count();
                self.insert_array(&group.name, "recordSpk", backend.create_array(NumericType::U32, words, default_loc))?;
            }
        }

        for group in model.synapse_groups() {
            let num_pre = model.neuron_group(group.src).num_neurons as usize;
            let num_post_u32 = model.neuron_group(group.target).num_neurons;
            let num_post = num_post_u32 as usize;
            let row_stride = backend.synaptic_matrix_row_stride(group, num_post_u32);

            let weight_count = match group.matrix_type.weight {
                WeightStorage::Kernel => group.kernel_size.as_ref().map(|dims| dims.iter().product::<u32>() as usize).unwrap_or(0),
                WeightStorage::ProceduralG => 0,
                WeightStorage::Individual => match group.matrix_type.connectivity {
                    ConnectivityKind::Dense | ConnectivityKind::Bitmask => num_pre * num_post,
                    ConnectivityKind::Sparse => num_pre * row_stride,
                    ConnectivityKind::Procedural | ConnectivityKind::Toeplitz => 0,
                },
            };
            if weight_count > 0 {
                for var in &group.weight_update_model.vars {
                    let ty = var.ty.unwrap_or(model.config.precision);
                    self.insert_array(&group.name, &var.name, backend.create_array(ty, weight_count, group.sparse_connectivity_location))?;
                }
            }

            match &group.connectivity {
                ConnectivityInit::Sparse { max_col_length, .. } => {
                    self.insert_array(&group.name, "rowLength", backend.create_array(NumericType::U32, num_pre, group.sparse_connectivity_location))?;
                    let narrow = NarrowIndexType::choose(num_post_u32, group.narrow_sparse_ind);
                    debug!("synapse group '{}': sparse ind stored as {:?} in the persisted layout", group.name, narrow);
                    self.insert_array(&group.name, "ind", backend.create_array(NumericType::U32, num_pre * row_stride, group.sparse_connectivity_location))?;
                    if max_col_length.is_some() && backend.is_postsynaptic_remap_required() {
                        let col_stride = max_col_length.unwrap() as usize;
                        self.insert_array(&group.name, "colLength", backend.create_array(NumericType::U32, num_post, group.sparse_connectivity_location))?;
                        self.insert_array(&group.name, "remap", backend.create_array(NumericType::U32, num_post * col_stride, group.sparse_connectivity_location))?;
                    }
                }
                ConnectivityInit::Bitmask { .. } => {
                    let words = (num_pre * num_post + 31) / 32;
                    self.insert_array(&group.name, "gp", backend.create_array(NumericType::U32, words, group.sparse_connectivity_location))?;
                }
                ConnectivityInit::Dense | ConnectivityInit::Procedural { .. } | ConnectivityInit::Toeplitz { .. } => {}
            }

            // `outPost`/`outPre` are the fused target/source accumulators a
            // bucket of consumer groups shares; this Runtime allocates one
            // per synapse group under the array name the kernel emitter
            // bakes into its text for that group's `inSyn` reference.
            self.insert_array(&group.name, "inSyn", backend.create_array(model.config.precision, batch * num_post, default_loc))?;

            if group.requires_dendritic_delay() {
                let slots = group.max_dendritic_delay_timesteps as usize;
                self.insert_array(&group.name, "denDelay", backend.create_array(model.config.precision, batch * num_post * slots, default_loc))?;
                self.insert_array(&group.name, "denDelayPtr", backend.create_array(NumericType::U32, 1, default_loc))?;
            }

            for var in &group.weight_update_model.pre_vars {
                let ty = var.ty.unwrap_or(model.config.precision);
                self.insert_array(&group.name, &format!("{}Pre", var.name), backend.create_array(ty, batch * num_pre, default_loc))?;
            }
            for var in &group.weight_update_model.post_vars {
                let ty = var.ty.unwrap_or(model.config.precision);
                self.insert_array(&group.name, &format!("{}Post", var.name), backend.create_array(ty, batch * num_post, default_loc))?;
            }
        }

        let allocate_mem: Symbol<AllocateMemFn> = self.symbol("allocateMem")?;
        unsafe { allocate_mem() };
        debug!(
            "allocate: {} arrays across {} neuron group(s) and {} synapse group(s)",
            self.arrays.len(),
            model.neuron_groups().len(),
            model.synapse_groups().len()
        );
        Ok(())
    }

    /// Invoke the exported `initialize` entrypoint.
    pub fn initialize(&self) -> Result<()> {
        let f: Symbol<InitializeFn> = self.symbol("initialize")?;
        unsafe { f() };
        Ok(())
    }

    /// Invoke the exported `initializeSparse` entrypoint.
    pub fn initialize_sparse(&self) -> Result<()> {
        let f: Symbol<InitializeSparseFn> = self.symbol("initializeSparse")?;
        unsafe { f() };
        Ok(())
    }

    /// Advance the simulation by one timestep: calls the exported
    /// `stepTime(timestep, numRecordingTimesteps)` and increments the
    /// local timestep counter. Either completes or fails with
    /// [`RuntimeError::SymbolMissing`]; there is no partial step.
    pub fn step_time(&mut self) -> Result<()> {
        let f: Symbol<StepTimeFn> = self.symbol("stepTime")?;
        let num_recording = self.num_recording_timesteps.unwrap_or(0) as u64;
        unsafe { f(self.timestep, num_recording) };
        self.timestep += 1;
        Ok(())
    }

    /// The local timestep counter (`spec.md` §4.7 `getTime`).
    pub fn get_time(&self) -> u64 {
        self.timestep
    }

    /// Look up the array backing `(group, name)` (`spec.md` §4.7 `getArray`).
    pub fn get_array(&self, group: &str, name: &str) -> Result<&Array> {
        self.arrays
            .get(&(group.to_string(), name.to_string()))
            .ok_or_else(|| RuntimeError::ArrayNotFound { group: group.to_string(), name: name.to_string() })
    }

    /// Mutable variant of [`Runtime::get_array`].
    pub fn get_array_mut(&mut self, group: &str, name: &str) -> Result<&mut Array> {
        self.arrays
            .get_mut(&(group.to_string(), name.to_string()))
            .ok_or_else(|| RuntimeError::ArrayNotFound { group: group.to_string(), name: name.to_string() })
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for key in self.insertion_order.drain(..).rev() {
            if let Some(mut array) = self.arrays.remove(&key) {
                array.free();
            }
        }
        if let Ok(free_mem) = self.symbol::<FreeMemFn>("freeMem") {
            unsafe { free_mem() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_stub_library() -> tempfile::TempPath {
        // Not a real shared object; `Runtime::load` only needs a path
        // `libloading::Library::new` will reject deterministically so the
        // LoadFailure path can be exercised without a compiled artifact
        // (this exercise never invokes the Rust toolchain to produce one).
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not an ELF shared object").unwrap();
        file.into_temp_path()
    }

    #[test]
    fn load_rejects_a_file_that_is_not_a_shared_library() {
        let path = write_stub_library();
        let err = Runtime::load(&path).unwrap_err();
        assert!(matches!(err, RuntimeError::LoadFailure { .. }));
    }

    #[test]
    fn array_not_found_names_the_group_and_variable() {
        let err = RuntimeError::ArrayNotFound { group: "Pop".to_string(), name: "V".to_string() };
        assert_eq!(err.to_string(), "no array 'V' allocated for group 'Pop'");
    }

    #[test]
    fn recording_unset_names_the_requesting_group() {
        let err = RuntimeError::RecordingUnset { group: "Pop".to_string() };
        assert!(err.to_string().contains("Pop"));
    }

    #[test]
    fn duplicate_array_names_the_group_and_variable() {
        let err = RuntimeError::DuplicateArray { group: "Pop".to_string(), name: "V".to_string() };
        assert_eq!(err.to_string(), "array 'V' already allocated for group 'Pop'");
    }
}
