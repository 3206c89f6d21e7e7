//! WebAssembly bindings for the simulation worker.
//!
//! A JavaScript worker shell owns the timer: it forwards host messages to
//! `handleMessage`, waits `nextDelay()` milliseconds, calls `tick()` and posts
//! whatever it returns back to the page.

use wasm_bindgen::prelude::*;

use crate::{
    compute::{BitGrid, Grid},
    protocol::{HostMessage, WorkerMessage},
    scheduler::{DiffMode, SessionChange, WorkerSession},
};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Worker-side protocol endpoint.
#[wasm_bindgen]
pub struct WasmSimulationWorker {
    session: WorkerSession,
    /// Time of the last tick (or of the start) in milliseconds.
    anchor_ms: Option<f64>,
}

#[wasm_bindgen]
impl WasmSimulationWorker {
    /// Create a worker. `full_grid` makes every changing generation list every row.
    #[wasm_bindgen(constructor)]
    pub fn new(full_grid: Option<bool>) -> WasmSimulationWorker {
        let diff_mode = if full_grid.unwrap_or(false) {
            DiffMode::FullGrid
        } else {
            DiffMode::Rows
        };
        WasmSimulationWorker {
            session: WorkerSession::new(diff_mode),
            anchor_ms: None,
        }
    }

    /// Apply a host message (`init`, `updateSpeed` or `stop`).
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: JsValue) -> Result<(), JsValue> {
        let message: HostMessage = serde_wasm_bindgen::from_value(message)
            .map_err(|e| JsValue::from_str(&format!("Invalid message: {e}")))?;
        self.apply(message)
    }

    /// `init` with the buffer passed as a `Uint8Array`, avoiding a copy through JS objects.
    #[wasm_bindgen(js_name = init)]
    pub fn init_run(
        &mut self,
        rows: usize,
        cols: usize,
        buffer: Vec<u8>,
        base_interval: f64,
        speed: f64,
    ) -> Result<(), JsValue> {
        self.apply(HostMessage::Init {
            rows,
            cols,
            buffer,
            base_interval,
            speed,
        })
    }

    /// Milliseconds until the next tick is due, or `undefined` when idle.
    #[wasm_bindgen(js_name = nextDelay)]
    pub fn next_delay(&self) -> Option<f64> {
        let deadline = self.deadline_ms()?;
        Some((deadline - js_sys::Date::now()).max(0.0))
    }

    /// Run the due tick, if any. Returns the message to post, or `null`.
    #[wasm_bindgen]
    pub fn tick(&mut self) -> Result<JsValue, JsValue> {
        let now = js_sys::Date::now();
        match self.deadline_ms() {
            Some(deadline) if deadline <= now => {}
            _ => return Ok(JsValue::NULL),
        }

        let message = self.session.tick();
        self.anchor_ms = self.session.is_running().then_some(now);
        match message {
            Some(message) => serde_wasm_bindgen::to_value(&message)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}"))),
            None => Ok(JsValue::NULL),
        }
    }

    /// Whether a run is active.
    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Generations computed in the current run.
    #[wasm_bindgen(js_name = getGeneration)]
    pub fn get_generation(&self) -> u64 {
        self.session.core().map_or(0, |core| core.generation())
    }
}

impl WasmSimulationWorker {
    fn apply(&mut self, message: HostMessage) -> Result<(), JsValue> {
        match self.session.handle(message).map_err(to_js_error)? {
            SessionChange::Started => self.anchor_ms = Some(js_sys::Date::now()),
            SessionChange::Stopped => self.anchor_ms = None,
            SessionChange::SpeedChanged | SessionChange::Ignored => {}
        }
        Ok(())
    }

    fn deadline_ms(&self) -> Option<f64> {
        let period = self.session.period()?;
        Some(self.anchor_ms? + period.as_secs_f64() * 1000.0)
    }
}

/// Pack a board given as an array of boolean rows.
#[wasm_bindgen(js_name = encodeGrid)]
pub fn encode_grid(rows: JsValue) -> Result<Vec<u8>, JsValue> {
    let rows: Vec<Vec<bool>> = serde_wasm_bindgen::from_value(rows)
        .map_err(|e| JsValue::from_str(&format!("Invalid grid: {e}")))?;
    let grid = Grid::from_rows(rows).map_err(to_js_error)?;
    Ok(BitGrid::encode(&grid).into_bytes())
}

/// Unpack a buffer into an array of boolean rows.
#[wasm_bindgen(js_name = decodeGrid)]
pub fn decode_grid(rows: usize, cols: usize, buffer: Vec<u8>) -> Result<JsValue, JsValue> {
    let grid = BitGrid::from_bytes(rows, cols, buffer)
        .map_err(to_js_error)?
        .decode();
    serde_wasm_bindgen::to_value(&grid.to_vecs())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

/// Merge a `patch` message into a board buffer in place.
#[wasm_bindgen(js_name = applyPatch)]
pub fn apply_patch(
    rows: usize,
    cols: usize,
    buffer: Vec<u8>,
    patch: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let message: WorkerMessage = serde_wasm_bindgen::from_value(patch)
        .map_err(|e| JsValue::from_str(&format!("Invalid patch: {e}")))?;
    let mut bits = BitGrid::from_bytes(rows, cols, buffer).map_err(to_js_error)?;
    if let WorkerMessage::Patch(patch) = message {
        patch.apply_to_bits(&mut bits).map_err(to_js_error)?;
    }
    Ok(bits.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_worker_idle_until_init() {
        let mut worker = WasmSimulationWorker::new(None);
        assert_eq!(worker.next_delay(), None);
        assert!(worker.tick().unwrap().is_null());
    }

    #[wasm_bindgen_test]
    fn test_init_then_stop() {
        let mut worker = WasmSimulationWorker::new(None);
        let buffer = vec![0b010, 0b010, 0b010];
        worker.init_run(3, 3, buffer, 200.0, 2.0).unwrap();
        assert!(worker.is_running());
        assert!(worker.next_delay().is_some_and(|d| d <= 100.0));

        worker.apply(HostMessage::Stop).unwrap();
        assert_eq!(worker.next_delay(), None);
    }

    #[wasm_bindgen_test]
    fn test_bad_buffer_rejected() {
        let mut worker = WasmSimulationWorker::new(None);
        assert!(worker.init_run(3, 3, vec![0; 2], 200.0, 1.0).is_err());
        assert!(!worker.is_running());
    }
}
