//! Component descriptors and ABI values.
//!
//! A component is described by its name and an ordered list of constructor
//! arguments. Arguments are either literal ABI values or references to another
//! component, which are substituted with that component's deployed address
//! right before the construction transaction is built.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, U256, keccak256},
};
use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, DeployResult},
    registry::ArtifactRegistry,
};

/// Unique name of a deployable component, e.g. `SwapFactory`.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Deref,
    Display,
    From,
)]
#[serde(transparent)]
pub struct ComponentName(String);

impl From<&str> for ComponentName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl ComponentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A Solidity ABI value that can be passed to a constructor or a wiring call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Bytes(Bytes),
    String(String),
}

impl AbiValue {
    /// The canonical Solidity type name used in function signatures.
    pub fn sol_type(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Uint(_) => "uint256",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
        }
    }

    fn to_dyn(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::Bytes(bytes) => DynSolValue::Bytes(bytes.to_vec()),
            Self::String(value) => DynSolValue::String(value.clone()),
        }
    }
}

impl From<Address> for AbiValue {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

/// ABI-encode a list of values as function (or constructor) parameters.
pub fn encode_params(values: &[AbiValue]) -> Vec<u8> {
    if values.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(values.iter().map(AbiValue::to_dyn).collect()).abi_encode_params()
}

/// Build the canonical signature of a call, e.g. `setFeeCollector(address)`.
pub fn function_signature(name: &str, values: &[AbiValue]) -> String {
    let types: Vec<&str> = values.iter().map(AbiValue::sol_type).collect();
    format!("{}({})", name, types.join(","))
}

/// Encode a call: 4-byte selector followed by the encoded parameters.
pub fn encode_call(name: &str, values: &[AbiValue]) -> Bytes {
    let selector = keccak256(function_signature(name, values).as_bytes());
    let mut calldata = selector[..4].to_vec();
    calldata.extend(encode_params(values));
    calldata.into()
}

/// A constructor or call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructorArg {
    /// A value known when the pipeline is defined.
    Literal(AbiValue),
    /// The deployed address of another component.
    Ref(ComponentName),
}

impl ConstructorArg {
    pub fn address(address: Address) -> Self {
        Self::Literal(AbiValue::Address(address))
    }

    pub fn reference(name: impl Into<ComponentName>) -> Self {
        Self::Ref(name.into())
    }
}

/// Static description of a deployable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// The component name, also the artifact name of its contract.
    pub name: ComponentName,
    /// Ordered constructor arguments.
    pub constructor_args: Vec<ConstructorArg>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<ComponentName>) -> Self {
        Self {
            name: name.into(),
            constructor_args: Vec::new(),
        }
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    /// The components this descriptor references, in argument order.
    pub fn references(&self) -> impl Iterator<Item = &ComponentName> {
        references(&self.constructor_args)
    }
}

pub(crate) fn references(args: &[ConstructorArg]) -> impl Iterator<Item = &ComponentName> {
    args.iter().filter_map(|arg| match arg {
        ConstructorArg::Ref(name) => Some(name),
        ConstructorArg::Literal(_) => None,
    })
}

/// Substitute every reference with the address recorded in the registry.
///
/// `owner` names the component or action the arguments belong to and is only
/// used for error reporting.
pub fn resolve_args(
    owner: &str,
    args: &[ConstructorArg],
    registry: &ArtifactRegistry,
) -> DeployResult<Vec<AbiValue>> {
    args.iter()
        .map(|arg| match arg {
            ConstructorArg::Literal(value) => Ok(value.clone()),
            ConstructorArg::Ref(name) => registry
                .get(name)
                .map(|record| AbiValue::Address(record.address))
                .ok_or_else(|| DeployError::UnresolvedDependency {
                    component: owner.to_string(),
                    dependency: name.to_string(),
                }),
        })
        .collect()
}
