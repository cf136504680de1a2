/// Flow-control callback consulted before every send.
///
/// Returning `false` refuses the message; the send fails with
/// [`crate::BsockError::FlowControl`] and nothing is written.
pub trait SendHook: Send {
    /// Decides whether the next message may go out.
    fn allow_send(&mut self) -> bool;
}

impl<F> SendHook for F
where
    F: FnMut() -> bool + Send,
{
    fn allow_send(&mut self) -> bool {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_hooks() {
        let mut budget = 2;
        let mut hook = move || {
            budget -= 1;
            budget >= 0
        };
        assert!(hook.allow_send());
        assert!(hook.allow_send());
        assert!(!hook.allow_send());
    }
}
