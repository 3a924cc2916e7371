//! The recursive multigrid cycle.
//!
//! One cycle at level k: pre-smooth, form the residual, restrict it into the
//! next level's right-hand side, recurse `cycle_degree` times (1 is a
//! V-cycle; 2 or more gives W-style cycles, each recursive visit starting
//! from the coarse solution the previous visit left behind), prolongate the
//! coarse correction back up, post-smooth. The bottom of the recursion is
//! the coarsest-level solve.

use crate::coarse;
use crate::error::AmgError;
use crate::hierarchy::Level;
use crate::kernels;
use crate::params::{AmgParameters, CfOrder};
use crate::smoother::{self, SmootherTask, SweepOrder, SweepSpan};

/// Run one full multigrid cycle over `levels`, finest first.
pub(crate) fn run_cycle(levels: &mut [Level], params: &AmgParameters) -> Result<(), AmgError> {
    let Some((fine, rest)) = levels.split_first_mut() else {
        return Ok(());
    };

    if rest.is_empty() {
        return coarse::solve_coarsest(fine, params);
    }

    smooth_level(fine, params, params.pre_sweeps)?;

    // Residual into the level's scratch vector, then down to the next rhs.
    fine.a.residual_norm(&fine.b, &fine.x, &mut fine.work);
    {
        let next = &mut rest[0];
        let r = fine
            .r
            .as_ref()
            .expect("interior level carries a restriction operator");
        r.spmv(&fine.work, &mut next.b);
        next.x.fill(0.0);
    }

    for _ in 0..params.cycle_degree {
        run_cycle(rest, params)?;
    }

    {
        let p = fine
            .p
            .as_ref()
            .expect("interior level carries a prolongation operator");
        p.spmv(&rest[0].x, &mut fine.work);
        kernels::axpy(1.0, &fine.work, &mut fine.x);
    }

    smooth_level(fine, params, params.post_sweeps)?;
    Ok(())
}

/// Apply the configured smoother to one level's `(A, b, x)`.
fn smooth_level(level: &mut Level, params: &AmgParameters, sweeps: usize) -> Result<(), AmgError> {
    if sweeps == 0 {
        return Ok(());
    }
    let n = level.a.rows;

    let order = if level.cf.is_empty() {
        SweepOrder::Natural
    } else {
        match params.cf_order {
            CfOrder::Natural => SweepOrder::Natural,
            CfOrder::CoarseFirst => SweepOrder::Grouped {
                first: &level.c_rows,
                second: &level.f_rows,
            },
            CfOrder::FineFirst => SweepOrder::Grouped {
                first: &level.f_rows,
                second: &level.c_rows,
            },
        }
    };

    let task = SmootherTask {
        kind: params.smoother,
        relax: params.relax,
        sweeps,
        span: SweepSpan::forward(n),
        poly_degree: params.poly_degree,
        order,
    };
    smoother::apply(&level.a, &level.b, &mut level.x, &task)
}
