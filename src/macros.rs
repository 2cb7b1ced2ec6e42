//! Bounded polling


/// Polls a non-blocking operation until it completes or a timer runs out
///
/// Expects two arguments:
///
/// - A `&mut` to a timer that implements `embedded_hal::timer::CountDown`,
///   already started with the timeout
/// - An expression that evaluates to `nb::Result<T, E>`
///
/// Evaluates to `Result<T, TimeoutError<E>>`. The operation is evaluated
/// before the timer is checked, so an operation that is ready right away
/// succeeds even if the timeout is zero.
macro_rules! block_timeout {
    ($timer:expr, $op:expr) => {
        {
            // Make sure the timer has the right type, so a mistake shows up
            // as a readable error.
            fn check_type<T>(_: &mut T)
                where T: $crate::embedded_hal::timer::CountDown {}
            check_type($timer);

            loop {
                match $op {
                    Ok(result) =>
                        break Ok(result),
                    Err($crate::nb::Error::WouldBlock) =>
                        (),
                    Err($crate::nb::Error::Other(error)) =>
                        break Err($crate::error::TimeoutError::Other(error)),
                }

                match $timer.wait() {
                    Ok(()) =>
                        break Err($crate::error::TimeoutError::Timeout),
                    Err($crate::nb::Error::WouldBlock) =>
                        (),
                    Err(_) =>
                        unreachable!(),
                }
            }
        }
    }
}
