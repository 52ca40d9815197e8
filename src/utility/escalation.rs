use crate::databases::*;
use crate::utility::member_locks::MemberGuard;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Warn { count: u32, max: u32 },
    Terminate,
}

/// Counter based warning policy per track. Every operation needs the member's
/// guard, which makes the read-increment-compare-delete sequence atomic with
/// respect to other work on the same member.
///
/// A `Terminate` verdict leaves the counter in place. The caller clears it with
/// [`EscalationTracker::reset`] once the kick or ban went through, so a failed
/// enforcement is retried on the next infraction instead of starting over.
#[derive(Clone)]
pub struct EscalationTracker {
    warnings: WarningsDB,
}

impl EscalationTracker {

    pub fn new(warnings: WarningsDB) -> Self {
        EscalationTracker { warnings }
    }

    pub async fn record_infraction(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<Verdict> {
        let id = guard.id();
        let max = track.threshold();
        let count = match self.warnings.increment(id, track).await? {
            Some(count) => count,
            None => {
                self.warnings.set(id, track, 1).await?;
                1
            }
        };

        if count >= max {
            return Ok(Verdict::Terminate);
        }
        Ok(Verdict::Warn { count, max })
    }

    /// Warns until the counter sits at the threshold and terminates only after
    /// that, so every termination is preceded by `threshold` warnings.
    pub async fn escalate(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<Verdict> {
        Ok(match self.advance(guard, track).await? {
            Some(count) => Verdict::Warn { count, max: track.threshold() },
            None        => Verdict::Terminate,
        })
    }

    /// Removes the counter. Returns whether there was one to remove.
    pub async fn reset(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<bool> {
        self.warnings.delete(guard.id(), track).await
    }

    /// (Re)starts the track at a count of one. Returns whether anything changed.
    pub async fn initialize(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<bool> {
        let current = self.warnings.find(guard.id(), track).await?;
        if matches!(current, Some(WarningRecord { count: 1, .. })) {
            return Ok(false);
        }
        self.warnings.set(guard.id(), track, 1).await?;
        Ok(true)
    }

    /// Raises the counter by one without ever terminating, saturating at the
    /// track's threshold. Returns the new count, or `None` if it was already
    /// saturated.
    pub async fn advance(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<Option<u32>> {
        let id = guard.id();
        let count = match self.warnings.find(id, track).await? {
            Some(record) if record.count >= track.threshold() => return Ok(None),
            Some(record) => record.count + 1,
            None => 1,
        };
        self.warnings.set(id, track, count).await?;
        Ok(Some(count))
    }

    pub async fn current(&self, guard: &MemberGuard, track: Track) -> anyhow::Result<u32> {
        Ok(self.warnings.find(guard.id(), track).await?
            .map(|record| record.count)
            .unwrap_or(0))
    }

}
