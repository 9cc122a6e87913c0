use color_eyre::eyre;
use tokio::sync::broadcast;

/// Why the application is shutting down
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupted {
    OsSigInt,
    UserInt,
}

/// Broadcasts the shutdown reason to every running loop
#[derive(Debug, Clone)]
pub struct Terminator {
    interrupt_tx: broadcast::Sender<Interrupted>,
}

impl Terminator {
    pub fn new(interrupt_tx: broadcast::Sender<Interrupted>) -> Self {
        Self { interrupt_tx }
    }

    pub fn terminate(&mut self, interrupted: Interrupted) -> eyre::Result<()> {
        self.interrupt_tx.send(interrupted)?;
        Ok(())
    }
}

async fn terminate_by_ctrl_c(mut terminator: Terminator) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            if let Err(e) = terminator.terminate(Interrupted::OsSigInt) {
                tracing::error!("failed to broadcast interrupt: {}", e);
            }
        }
        Err(e) => tracing::error!("cannot listen for ctrl-c: {}", e),
    }
}

pub fn create_termination() -> (Terminator, broadcast::Receiver<Interrupted>) {
    let (tx, rx) = broadcast::channel(1);
    let terminator = Terminator::new(tx);

    tokio::spawn(terminate_by_ctrl_c(terminator.clone()));

    (terminator, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_reaches_every_subscriber() {
        let (mut terminator, mut rx) = create_termination();
        let mut other = rx.resubscribe();
        terminator.terminate(Interrupted::UserInt).unwrap();
        assert_eq!(rx.recv().await.unwrap(), Interrupted::UserInt);
        assert_eq!(other.recv().await.unwrap(), Interrupted::UserInt);
    }
}
