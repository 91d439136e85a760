use async_trait::async_trait;

use ferron_core::Tick;

/// An opaque handle to an enqueued task, returned by `Scheduler::task_new`
/// and handed back to `task_delete`/`task_free`. The control plane never
/// looks inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

/// What a task carries: who processes it, what context it's processing
/// (here always a server's `puid`), and when it's due.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
  pub context_puid: u32,
  pub expire: Tick,
}

/// The scheduler collaborator named in §6: `task_new`, `task_queue`,
/// `task_delete`, `task_free`. The control plane attaches
/// `(processor, context, deadline)` triples and never drives time itself —
/// here, the "processor" is implicit (always the health-check routine for a
/// server's check task), so only `context`/`expire` need to be threaded
/// through.
#[async_trait]
pub trait Scheduler: Send + Sync {
  /// `task_new`: allocates a task, not yet scheduled.
  async fn task_new(&self) -> TaskHandle;

  /// `task_queue`: schedules (or reschedules) a task to fire at `spec.expire`.
  async fn task_queue(&self, task: TaskHandle, spec: TaskSpec);

  /// `task_delete`: removes a task from the run queue without freeing it.
  async fn task_delete(&self, task: TaskHandle);

  /// `task_free`: releases a task's resources. Must be called only after
  /// `task_delete`, per the "check Task cancelled and freed before memory
  /// reclamation" ordering guarantee (§5).
  async fn task_free(&self, task: TaskHandle);
}
