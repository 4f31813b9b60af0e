//! Call shapes a task can carry.
//!
//! [`Callable`] erases the arity of a job: every `Fn(A, B, ..) -> R` becomes
//! a `Callable<(A, B, ..)>` that is invoked with one argument tuple.
//! [`OnComplete`] does the same for completion callbacks, so a job returning
//! `()` may take a zero-argument callback while any other job's callback
//! receives the result.

use std::sync::Arc;

/// A job body invoked with its arguments packed into a tuple.
pub trait Callable<Args>: Send + Sync + 'static {
    type Output;

    fn call(&self, args: Args) -> Self::Output;
}

macro_rules! impl_callable {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Callable<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Out + Send + Sync + 'static,
        {
            type Output = Out;

            #[allow(non_snake_case, reason = "tuple fields reuse the type parameter names")]
            fn call(&self, ($($arg,)*): ($($arg,)*)) -> Out {
                (self)($($arg),*)
            }
        }
    };
}

impl_callable!();
impl_callable!(A);
impl_callable!(A, B);
impl_callable!(A, B, C);
impl_callable!(A, B, C, D);

/// Erased completion callback receiving the job result.
pub type Callback<R> = Arc<dyn Fn(R) + Send + Sync>;

/// Marker for callbacks that take the job result.
#[derive(Debug)]
pub struct WithResult;

/// Marker for zero-argument callbacks on jobs returning `()`.
#[derive(Debug)]
pub struct WithoutResult;

/// A completion callback for a job returning `R`.
pub trait OnComplete<R, Marker>: Send + Sync + 'static {
    fn into_callback(self) -> Callback<R>;
}

impl<R, F> OnComplete<R, WithResult> for F
where
    F: Fn(R) + Send + Sync + 'static,
    R: 'static,
{
    fn into_callback(self) -> Callback<R> {
        Arc::new(self)
    }
}

impl<F> OnComplete<(), WithoutResult> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn into_callback(self) -> Callback<()> {
        Arc::new(move |()| self())
    }
}
