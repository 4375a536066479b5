//! Tile lowering pipeline.
//!
//! ```text
//! Module (tile.tile)
//!     │
//!     ▼
//! tile_to_scf::lower ─► Module (scf.for + extract/insert_slice)
//!     │
//!     ▼  [verify]
//! ConversionTarget (tile illegal) ─► validate_all
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tessera_ir::rewrite::{ApplyResult, ConversionTarget, Legality};
use tessera_ir::validation::validate_all;
use tessera_ir::{IrContext, Module};
use tessera_passes::TileLoweringConfig;
use tessera_passes::tile_to_scf;

use crate::error::{PipelineError, PipelineResult};

/// Options for [`lower_tiles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub lowering: TileLoweringConfig,
    /// Check that no `tile` op survives and that the result validates.
    /// Default: true.
    pub verify: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            lowering: TileLoweringConfig::default(),
            verify: true,
        }
    }
}

impl PipelineOptions {
    pub fn with_lowering(mut self, lowering: TileLoweringConfig) -> Self {
        self.lowering = lowering;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// What a pipeline run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub apply: ApplyResult,
    /// Whether the verification stage ran.
    pub verified: bool,
}

impl PipelineReport {
    /// Number of `tile.tile` constructs lowered.
    pub fn lowered(&self) -> usize {
        self.apply.total_changes
    }
}

/// Lower every `tile.tile` in `module` to `scf.for`.
///
/// # Panics
///
/// Panics if a `tile.tile` is malformed; see
/// [`tessera_passes::check_preconditions`].
pub fn lower_tiles(
    ctx: &mut IrContext,
    module: Module,
    options: &PipelineOptions,
) -> PipelineResult<PipelineReport> {
    let apply = tile_to_scf::lower(ctx, module, &options.lowering);
    debug!(?apply, "tile lowering finished");
    if !apply.reached_fixpoint {
        return Err(PipelineError::NoFixpoint {
            rewrites: apply.total_changes,
        });
    }

    if options.verify {
        let target = ConversionTarget::new().with_dialect("tile", Legality::Illegal);
        apply.verify(ctx, module, &target)?;

        let report = validate_all(ctx, module);
        if !report.is_ok() {
            return Err(report.into());
        }
    }

    info!(lowered = apply.total_changes, verified = options.verify, "lowered tiles");
    Ok(PipelineReport {
        apply,
        verified: options.verify,
    })
}
