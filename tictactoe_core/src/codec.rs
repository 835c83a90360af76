// Contract call codec: native values <-> contract wire values
//
// Values are the ledger's own `ScVal` XDR. Conventions follow the contract
// runtime's value model:
// - `None` is `Void`, `Some(x)` is the encoding of `x`
// - tagged unions are `Vec[Symbol(tag), payload...]`
// - records are `Map` entries keyed by field symbol, sorted by key
// - tuples are `Vec`

use crate::error::CoreError;
use crate::symbol::Symbol;
use std::collections::BTreeMap;
use std::str::FromStr;
use stellar_xdr::curr::{InvokeContractArgs, ScAddress, ScMap, ScSymbol, ScVec, VecM};

pub use stellar_xdr::curr::{Int128Parts, ScMapEntry, ScVal, UInt128Parts};

pub type DecodeResult<T> = Result<T, CoreError>;

/// Wire symbol for a name that already fits the symbol rules: record keys,
/// variant tags and validated `Symbol`s. Longer names encode as empty.
pub fn symbol_val(name: &str) -> ScVal {
    ScVal::Symbol(ScSymbol::try_from(name).unwrap_or_default())
}

/// Wire vector; `VecM<ScVal>` only caps at `u32::MAX` entries
pub fn vec_val(items: Vec<ScVal>) -> ScVal {
    ScVal::Vec(Some(ScVec(items.try_into().unwrap_or_default())))
}

fn symbol_str(sym: &ScSymbol) -> DecodeResult<&str> {
    std::str::from_utf8(sym.as_slice())
        .map_err(|e| CoreError::Decode(format!("symbol is not UTF-8: {}", e)))
}

fn vec_items(val: &ScVal) -> Option<&[ScVal]> {
    match val {
        ScVal::Vec(Some(items)) => Some(items.0.as_slice()),
        _ => None,
    }
}

/// Encode a native value into its wire form
pub trait ToScVal {
    fn to_sc_val(&self) -> ScVal;
}

/// Decode a wire value; the implementing type is the expected shape
pub trait FromScVal: Sized {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self>;
}

pub fn decode<T: FromScVal>(val: &ScVal) -> DecodeResult<T> {
    T::from_sc_val(val)
}

pub(crate) fn mismatch<T>(expected: &str, got: &ScVal) -> DecodeResult<T> {
    Err(CoreError::Decode(format!("expected {}, got {}", expected, got.name())))
}

macro_rules! scalar_codec {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ToScVal for $ty {
            fn to_sc_val(&self) -> ScVal {
                ScVal::$variant(*self)
            }
        }

        impl FromScVal for $ty {
            fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
                match val {
                    ScVal::$variant(v) => Ok(*v),
                    other => mismatch($name, other),
                }
            }
        }
    };
}

scalar_codec!(bool, Bool, "bool");
scalar_codec!(u32, U32, "u32");
scalar_codec!(i32, I32, "i32");
scalar_codec!(u64, U64, "u64");
scalar_codec!(i64, I64, "i64");

impl ToScVal for u128 {
    fn to_sc_val(&self) -> ScVal {
        ScVal::U128(UInt128Parts { hi: (*self >> 64) as u64, lo: *self as u64 })
    }
}

impl FromScVal for u128 {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match val {
            ScVal::U128(parts) => Ok(((parts.hi as u128) << 64) | parts.lo as u128),
            other => mismatch("u128", other),
        }
    }
}

impl ToScVal for i128 {
    fn to_sc_val(&self) -> ScVal {
        ScVal::I128(Int128Parts { hi: (*self >> 64) as i64, lo: *self as u64 })
    }
}

impl FromScVal for i128 {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match val {
            ScVal::I128(parts) => Ok(((parts.hi as i128) << 64) | parts.lo as i128),
            other => mismatch("i128", other),
        }
    }
}

impl ToScVal for () {
    fn to_sc_val(&self) -> ScVal {
        ScVal::Void
    }
}

impl FromScVal for () {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match val {
            ScVal::Void => Ok(()),
            other => mismatch("void", other),
        }
    }
}

impl ToScVal for Symbol {
    fn to_sc_val(&self) -> ScVal {
        symbol_val(self.as_str())
    }
}

impl FromScVal for Symbol {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match val {
            ScVal::Symbol(s) => Symbol::new(symbol_str(s)?)
                .map_err(|e| CoreError::Decode(format!("invalid symbol on the wire: {}", e))),
            other => mismatch("symbol", other),
        }
    }
}

impl<T: ToScVal> ToScVal for Option<T> {
    fn to_sc_val(&self) -> ScVal {
        match self {
            Some(v) => v.to_sc_val(),
            None => ScVal::Void,
        }
    }
}

impl<T: FromScVal> FromScVal for Option<T> {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match val {
            ScVal::Void => Ok(None),
            other => T::from_sc_val(other).map(Some),
        }
    }
}

impl<T: ToScVal> ToScVal for Vec<T> {
    fn to_sc_val(&self) -> ScVal {
        vec_val(self.iter().map(ToScVal::to_sc_val).collect())
    }
}

impl<T: FromScVal> FromScVal for Vec<T> {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match vec_items(val) {
            Some(items) => items.iter().map(T::from_sc_val).collect(),
            None => mismatch("vec", val),
        }
    }
}

impl<A: ToScVal, B: ToScVal> ToScVal for (A, B) {
    fn to_sc_val(&self) -> ScVal {
        vec_val(vec![self.0.to_sc_val(), self.1.to_sc_val()])
    }
}

impl<A: FromScVal, B: FromScVal> FromScVal for (A, B) {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match vec_items(val) {
            Some([a, b]) => Ok((A::from_sc_val(a)?, B::from_sc_val(b)?)),
            Some(items) => Err(CoreError::Decode(format!(
                "expected 2-tuple, got vec of {}",
                items.len()
            ))),
            None => mismatch("tuple", val),
        }
    }
}

/// Encode a tagged union variant
pub fn variant(tag: &str, payload: Vec<ScVal>) -> ScVal {
    let mut items = Vec::with_capacity(payload.len() + 1);
    items.push(symbol_val(tag));
    items.extend(payload);
    vec_val(items)
}

/// Split a tagged union into its tag and payload
pub fn split_variant(val: &ScVal) -> DecodeResult<(&str, &[ScVal])> {
    let items = match vec_items(val) {
        Some(items) => items,
        None => return mismatch("variant", val),
    };
    match items.split_first() {
        Some((ScVal::Symbol(tag), payload)) => Ok((symbol_str(tag)?, payload)),
        Some((other, _)) => mismatch("variant tag symbol", other),
        None => Err(CoreError::Decode("empty variant".to_string())),
    }
}

/// Encode a record; entries are sorted by field name
pub fn record(fields: Vec<(&str, ScVal)>) -> ScVal {
    let mut fields = fields;
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let entries: Vec<ScMapEntry> = fields
        .into_iter()
        .map(|(name, val)| ScMapEntry { key: symbol_val(name), val })
        .collect();
    ScVal::Map(Some(ScMap(entries.try_into().unwrap_or_default())))
}

/// Field lookup over a decoded record
pub struct RecordFields<'a> {
    type_name: &'static str,
    fields: BTreeMap<&'a str, &'a ScVal>,
}

impl<'a> RecordFields<'a> {
    /// Index a record, requiring exactly the `expected` field names
    pub fn parse(type_name: &'static str, val: &'a ScVal, expected: &[&str]) -> DecodeResult<Self> {
        let entries = match val {
            ScVal::Map(Some(map)) => map.0.as_slice(),
            other => return mismatch(type_name, other),
        };

        let mut fields = BTreeMap::new();
        for entry in entries {
            match &entry.key {
                ScVal::Symbol(sym) => {
                    let name = symbol_str(sym)?;
                    if !expected.contains(&name) {
                        return Err(CoreError::Decode(format!(
                            "unexpected field '{}' in {}",
                            name, type_name
                        )));
                    }
                    fields.insert(name, &entry.val);
                }
                other => return mismatch("record key symbol", other),
            }
        }

        if let Some(missing) = expected.iter().find(|name| !fields.contains_key(*name)) {
            return Err(CoreError::Decode(format!(
                "missing field '{}' in {}",
                missing, type_name
            )));
        }

        Ok(Self { type_name, fields })
    }

    pub fn get<T: FromScVal>(&self, name: &str) -> DecodeResult<T> {
        let val = self.fields.get(name).ok_or_else(|| {
            CoreError::Decode(format!("missing field '{}' in {}", name, self.type_name))
        })?;
        T::from_sc_val(val).map_err(|e| match e {
            CoreError::Decode(msg) => {
                CoreError::Decode(format!("{}.{}: {}", self.type_name, name, msg))
            }
            other => other,
        })
    }
}

/// A contract entry-point invocation, ready to be placed in an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: ScAddress,
    pub function: Symbol,
    pub args: VecM<ScVal>,
}

impl ContractCall {
    /// Pure and deterministic: the same inputs always encode the same call
    pub fn new(contract_id: &str, method: &str, args: Vec<ScVal>) -> Result<Self, CoreError> {
        let function = Symbol::new(method)?;
        let contract = match ScAddress::from_str(contract_id.trim()) {
            Ok(address @ ScAddress::Contract(_)) => address,
            _ => {
                return Err(CoreError::Validation(format!(
                    "'{}' is not a contract address",
                    contract_id
                )))
            }
        };
        let args = args
            .try_into()
            .map_err(|_| CoreError::Validation(format!("Too many arguments for {}", method)))?;
        Ok(Self { contract, function, args })
    }
}

impl From<ContractCall> for InvokeContractArgs {
    fn from(call: ContractCall) -> Self {
        let function_name = ScSymbol::try_from(call.function.as_str()).unwrap_or_default();
        InvokeContractArgs { contract_address: call.contract, function_name, args: call.args }
    }
}
