//! Work done by one designated rank while the others wait.

use distributed_mesh::Communicator;
use tracing::{error, instrument};

use crate::error::{ConversionError, Result};

/// Run `work` on `coordinator` only, then meet every rank at a barrier.
///
/// After the barrier the coordinator broadcasts whether `work` succeeded, so
/// every rank returns an error when it failed. The coordinator gets
/// `Some(result)`; the other ranks get `None`.
#[instrument(skip_all, fields(rank = comm.rank(), coordinator = coordinator))]
pub fn run_on_coordinator<C, T, F>(comm: &C, coordinator: usize, work: F) -> Result<Option<T>>
where
    C: Communicator,
    F: FnOnce() -> Result<T>,
{
    if coordinator >= comm.size() {
        return Err(ConversionError::Config(format!(
            "coordinator {} is not one of {} ranks",
            coordinator,
            comm.size()
        )));
    }

    let outcome = (comm.rank() == coordinator).then(work);
    if let Some(Err(e)) = &outcome {
        error!(error = %e, "Coordinator work failed");
    }

    comm.barrier()?;
    let succeeded = comm.broadcast_flag(coordinator, matches!(outcome, Some(Ok(_))))?;

    match outcome {
        Some(result) => result.map(Some),
        None if succeeded => Ok(None),
        None => Err(ConversionError::CoordinatorFailed(coordinator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distributed_mesh::{SerialComm, ThreadComm};

    #[test]
    fn test_serial_runs_work() {
        let result = run_on_coordinator(&SerialComm, 0, || Ok(7)).unwrap();
        assert_eq!(result, Some(7));
    }

    #[test]
    fn test_only_coordinator_runs_work() {
        let results = ThreadComm::run(3, |comm| run_on_coordinator(&comm, 2, || Ok(comm.rank())));
        let values: Vec<Option<usize>> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![None, None, Some(2)]);
    }

    #[test]
    fn test_failure_reaches_every_rank() {
        let results = ThreadComm::run(3, |comm| {
            run_on_coordinator(&comm, 1, || -> Result<()> {
                Err(ConversionError::Config("boom".to_string()))
            })
        });
        assert!(matches!(results[0], Err(ConversionError::CoordinatorFailed(1))));
        assert!(matches!(results[1], Err(ConversionError::Config(_))));
        assert!(matches!(results[2], Err(ConversionError::CoordinatorFailed(1))));
    }

    #[test]
    fn test_invalid_coordinator() {
        assert!(matches!(
            run_on_coordinator(&SerialComm, 1, || Ok(())),
            Err(ConversionError::Config(_))
        ));
    }
}
