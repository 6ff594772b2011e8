//! # Parameter Binding
//!
//! Turns the length-prefixed segments of a call body into the values a
//! handler declared, in declaration order.
//!
//! ## Rules
//! - Segment count must equal the declared parameter count.
//! - A zero-length segment binds the declared type's zero value
//!   (`Default::default()`: `0`, `false`, `""`, `None`, default struct).
//! - Any other segment is decoded with the session serializer; a decode
//!   failure aborts the call before the handler runs.

use crate::core::packet::{split_segments, write_segment, Packet};
use crate::core::serialization::Serializer;
use crate::error::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any};
use tracing::trace;

type BoxedValue = Box<dyn Any + Send>;

/// Runtime descriptor of one declared handler parameter.
pub struct ParameterType<S> {
    type_name: &'static str,
    decode: fn(&S, &[u8]) -> Result<BoxedValue>,
    zero: fn() -> BoxedValue,
}

impl<S> Clone for ParameterType<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for ParameterType<S> {}

impl<S> std::fmt::Debug for ParameterType<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ParameterType").field(&self.type_name).finish()
    }
}

impl<S: Serializer> ParameterType<S> {
    /// Descriptor for a parameter of type `T`.
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            decode: decode_boxed::<S, T>,
            zero: zero_boxed::<T>,
        }
    }
}

impl<S> ParameterType<S> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn bind(&self, serializer: &S, segment: &[u8]) -> Result<BoxedValue> {
        if segment.is_empty() {
            Ok((self.zero)())
        } else {
            (self.decode)(serializer, segment)
        }
    }
}

fn decode_boxed<S, T>(serializer: &S, bytes: &[u8]) -> Result<BoxedValue>
where
    S: Serializer,
    T: DeserializeOwned + Send + 'static,
{
    Ok(Box::new(serializer.deserialize::<T>(bytes)?))
}

fn zero_boxed<T: Default + Send + 'static>() -> BoxedValue {
    Box::new(T::default())
}

/// Bound argument values, in declaration order.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<Option<BoxedValue>>,
}

impl Arguments {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the argument at `index` as `T`.
    pub fn get<T: 'static>(&self, index: usize) -> Result<&T> {
        self.slot(index)?
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or(RpcError::ArgumentType {
                index,
                expected: type_name::<T>(),
            })
    }

    /// Move the argument at `index` out as `T`. Each argument can be taken once.
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T> {
        let mismatch = RpcError::ArgumentType {
            index,
            expected: type_name::<T>(),
        };
        let slot = self.slot_mut(index)?;
        match slot.take() {
            Some(value) => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(original) => {
                    *slot = Some(original);
                    Err(mismatch)
                }
            },
            None => Err(mismatch),
        }
    }

    fn slot(&self, index: usize) -> Result<&Option<BoxedValue>> {
        self.values.get(index).ok_or(RpcError::ArgumentCount {
            expected: index + 1,
            actual: self.values.len(),
        })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Option<BoxedValue>> {
        let actual = self.values.len();
        self.values.get_mut(index).ok_or(RpcError::ArgumentCount {
            expected: index + 1,
            actual,
        })
    }
}

/// Decode the call body of `packet` into `parameter_types`.
pub fn bind_parameters<S>(
    serializer: &S,
    parameter_types: &[ParameterType<S>],
    packet: &Packet,
) -> Result<Arguments> {
    let segments = split_segments(&packet.body)?;
    if segments.len() != parameter_types.len() {
        return Err(RpcError::ArgumentCount {
            expected: parameter_types.len(),
            actual: segments.len(),
        });
    }

    let mut values = Vec::with_capacity(segments.len());
    for (index, (segment, parameter)) in segments.iter().zip(parameter_types).enumerate() {
        let value = parameter.bind(serializer, segment).map_err(|e| {
            RpcError::Deserialize(format!(
                "parameter {index} ({}): {e}",
                parameter.type_name()
            ))
        })?;
        values.push(Some(value));
    }

    trace!(id = packet.id, api = %packet.api, count = values.len(), "Parameters bound");
    Ok(Arguments { values })
}

/// Builder for the segmented body of an outbound call.
#[derive(Debug, Clone, Default)]
pub struct CallArguments {
    body: Vec<u8>,
    count: usize,
}

impl CallArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` encoded with `serializer`.
    pub fn push<S, T>(mut self, serializer: &S, value: &T) -> Result<Self>
    where
        S: Serializer,
        T: Serialize + ?Sized,
    {
        let bytes = serializer.serialize(value)?;
        write_segment(&mut self.body, &bytes);
        self.count += 1;
        Ok(self)
    }

    /// Append a zero-length segment; the callee binds its zero value.
    pub fn push_empty(mut self) -> Self {
        write_segment(&mut self.body, &[]);
        self.count += 1;
        self
    }

    /// Append an already encoded segment.
    pub fn push_raw(mut self, bytes: &[u8]) -> Self {
        write_segment(&mut self.body, bytes);
        self.count += 1;
        self
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
