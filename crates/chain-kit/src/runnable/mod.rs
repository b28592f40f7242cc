//! Composable pipeline steps
//!
//! Every prompt, model call and parser is a [`Runnable`]; `a.pipe(b)` chains
//! them so the output of one is the input of the next.

mod llm;
mod parallel;

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::Result;

pub use llm::LlmStep;
pub use parallel::Parallel;

#[async_trait]
pub trait Runnable: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    async fn invoke(&self, input: Self::Input) -> Result<Self::Output>;

    /// Feed this step's output into `next`
    fn pipe<R>(self, next: R) -> Sequence<Self, R>
    where
        Self: Sized,
        R: Runnable<Input = Self::Output>,
    {
        Sequence {
            first: self,
            second: next,
        }
    }
}

/// Two steps run back to back
pub struct Sequence<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Runnable for Sequence<A, B>
where
    A: Runnable,
    B: Runnable<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn invoke(&self, input: A::Input) -> Result<B::Output> {
        let intermediate = self.first.invoke(input).await?;
        self.second.invoke(intermediate).await
    }
}

/// Identity step
pub struct Passthrough<T> {
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> Passthrough<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Passthrough<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> Runnable for Passthrough<T> {
    type Input = T;
    type Output = T;

    async fn invoke(&self, input: T) -> Result<T> {
        Ok(input)
    }
}

/// Wraps a synchronous closure
pub struct Lambda<F, I, O> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> Lambda<F, I, O>
where
    F: Fn(I) -> Result<O> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O> Runnable for Lambda<F, I, O>
where
    F: Fn(I) -> Result<O> + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn invoke(&self, input: I) -> Result<O> {
        (self.f)(input)
    }
}
