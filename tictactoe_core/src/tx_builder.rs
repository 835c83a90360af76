// Transaction envelope assembly and blob encoding

use crate::codec::ContractCall;
use crate::error::CoreError;
use crate::rpc_client::AccountInfo;
use chrono::Utc;
use stellar_xdr::curr::{
    DecoratedSignature, HostFunction, InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation, OperationBody,
    Preconditions, PublicKey, ReadXdr, SequenceNumber, SorobanAuthorizationEntry, SorobanTransactionData, TimeBounds,
    TimePoint, Transaction, TransactionEnvelope, TransactionExt, VecM, WriteXdr,
};

/// Fee and expiry applied to one envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBudget {
    pub fee: u32,
    pub timeout_secs: u64,
}

impl FeeBudget {
    /// Read-only calls: minimal fee, short expiry
    pub const QUERY: FeeBudget = FeeBudget { fee: 100, timeout_secs: 30 };
    /// State-changing calls pay for computation and storage
    pub const INVOKE: FeeBudget = FeeBudget { fee: 1_000_000, timeout_secs: 300 };
}

/// Envelope as XDR base64, the form wallets and the RPC exchange
pub fn to_blob(envelope: &TransactionEnvelope) -> Result<String, CoreError> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

pub fn from_blob(blob: &str) -> Result<TransactionEnvelope, CoreError> {
    TransactionEnvelope::from_xdr_base64(blob.trim(), Limits::none())
        .map_err(|e| CoreError::Decode(format!("Failed to decode transaction envelope: {}", e)))
}

/// Last four bytes of the source key, which every signature by it carries as a hint
pub fn signer_hint(source: &MuxedAccount) -> [u8; 4] {
    let PublicKey::PublicKeyTypeEd25519(key) = source.clone().account_id().0;
    let mut hint = [0u8; 4];
    hint.copy_from_slice(&key.0[28..]);
    hint
}

/// Check a wallet's signed envelope against the transaction that was sent
/// to it. The wallet may only add signatures, and one must be by the source.
pub fn verify_signed(built: &Transaction, signed: &TransactionEnvelope) -> Result<(), String> {
    let TransactionEnvelope::Tx(signed) = signed else {
        return Err("returned a different kind of envelope".to_string());
    };
    if signed.tx != *built {
        return Err("signed a different transaction".to_string());
    }
    if signed.signatures.is_empty() {
        return Err("returned an unsigned envelope".to_string());
    }
    let hint = signer_hint(&built.source_account);
    if !signed.signatures.iter().any(|sig: &DecoratedSignature| sig.hint.0 == hint) {
        return Err("signed with a key other than the source account".to_string());
    }
    Ok(())
}

pub struct TransactionBuilder<'a> {
    account: &'a AccountInfo,
    budget: FeeBudget,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(account: &'a AccountInfo, budget: FeeBudget) -> Self {
        Self { account, budget }
    }

    /// One contract invocation from the account's next sequence number,
    /// valid until the budget's timeout.
    pub fn build(&self, call: ContractCall) -> Result<Transaction, CoreError> {
        let max_time = Utc::now().timestamp().max(0) as u64 + self.budget.timeout_secs;
        let operation = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(call.into()),
                auth: VecM::default(),
            }),
        };
        Ok(Transaction {
            source_account: self.account.account_id.clone().into(),
            fee: self.budget.fee,
            seq_num: SequenceNumber(self.account.sequence + 1),
            cond: Preconditions::Time(TimeBounds { min_time: TimePoint(0), max_time: TimePoint(max_time) }),
            memo: Memo::None,
            operations: vec![operation].try_into()?,
            ext: TransactionExt::V0,
        })
    }
}

/// Attach simulation results: resource footprint, authorizations and the
/// resource fee on top of the inclusion fee.
pub fn assemble(
    mut tx: Transaction,
    data: SorobanTransactionData,
    auth: Vec<SorobanAuthorizationEntry>,
    resource_fee: u64,
) -> Result<Transaction, CoreError> {
    let fee = u64::from(tx.fee)
        .checked_add(resource_fee)
        .and_then(|total| u32::try_from(total).ok())
        .ok_or_else(|| CoreError::Simulation(format!("Resource fee {} exceeds the fee limit", resource_fee)))?;
    tx.fee = fee;

    let mut operations = tx.operations.to_vec();
    for op in operations.iter_mut() {
        if let OperationBody::InvokeHostFunction(invoke) = &mut op.body {
            invoke.auth = auth.clone().try_into()?;
        }
    }
    tx.operations = operations.try_into()?;
    tx.ext = TransactionExt::V1(data);
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ScVal;
    use std::str::FromStr;
    use stellar_xdr::curr::{
        AccountId, ExtensionPoint, LedgerFootprint, Signature, SignatureHint, SorobanResources, TransactionV1Envelope,
    };

    const ALICE: &str = "GBZXN7PIRZGNMHGA7MUUUF4GWPY5AYPV6LY4UV2GL6VJGIQRXFDNMADI";
    const BOB: &str = "GCA3MN6Y7TJMNWTDLHTJMMITUELQ3Z4V4S3SLOCNDYFUZ7M6YWGOTE64";
    const CONTRACT: &str = "CAFAPH7VQYLJZ3B4SGAJ47AD3ZOSM63CTQOUXT5XDQH3HWAKEONUO3GU";

    fn account() -> AccountInfo {
        AccountInfo { account_id: AccountId::from_str(ALICE).unwrap(), sequence: 41 }
    }

    fn build(budget: FeeBudget) -> Transaction {
        let account = account();
        let call = ContractCall::new(CONTRACT, "make_move", vec![ScVal::U32(1)]).unwrap();
        TransactionBuilder::new(&account, budget).build(call).unwrap()
    }

    fn signed_by(tx: &Transaction, address: &str) -> TransactionEnvelope {
        let source: MuxedAccount = AccountId::from_str(address).unwrap().into();
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: tx.clone(),
            signatures: vec![DecoratedSignature {
                hint: SignatureHint(signer_hint(&source)),
                signature: Signature(vec![7u8; 64].try_into().unwrap()),
            }]
            .try_into()
            .unwrap(),
        })
    }

    #[test]
    fn test_build_uses_next_sequence_and_budget() {
        let before = Utc::now().timestamp() as u64;
        let tx = build(FeeBudget::QUERY);

        assert_eq!(tx.seq_num, SequenceNumber(42));
        assert_eq!(tx.fee, 100);
        assert_eq!(tx.source_account.to_string(), ALICE);
        match &tx.cond {
            Preconditions::Time(bounds) => assert!(bounds.max_time.0 >= before + 30),
            other => panic!("unexpected preconditions {:?}", other),
        }
        assert_eq!(tx.operations.len(), 1);
        match &tx.operations[0].body {
            OperationBody::InvokeHostFunction(op) => match &op.host_function {
                HostFunction::InvokeContract(args) => {
                    assert_eq!(args.contract_address.to_string(), CONTRACT);
                    assert_eq!(args.args.to_vec(), vec![ScVal::U32(1)]);
                }
                other => panic!("unexpected host function {:?}", other),
            },
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_blob_is_envelope_xdr() {
        let env: TransactionEnvelope = build(FeeBudget::INVOKE).into();
        let blob = to_blob(&env).unwrap();
        assert_eq!(from_blob(&blob).unwrap(), env);
        assert!(matches!(from_blob("%%%"), Err(CoreError::Decode(_))));
    }

    #[test]
    fn test_assemble_applies_simulation() {
        let data = SorobanTransactionData {
            ext: ExtensionPoint::V0,
            resources: SorobanResources {
                footprint: LedgerFootprint { read_only: VecM::default(), read_write: VecM::default() },
                instructions: 1000,
                read_bytes: 10,
                write_bytes: 10,
            },
            resource_fee: 4200,
        };
        let tx = assemble(build(FeeBudget::INVOKE), data.clone(), vec![], 4200).unwrap();
        assert_eq!(tx.fee, 1_004_200);
        assert_eq!(tx.ext, TransactionExt::V1(data.clone()));

        assert!(matches!(
            assemble(build(FeeBudget::INVOKE), data, vec![], u64::from(u32::MAX)),
            Err(CoreError::Simulation(_))
        ));
    }

    #[test]
    fn test_verify_signed() {
        let tx = build(FeeBudget::INVOKE);
        assert_eq!(verify_signed(&tx, &signed_by(&tx, ALICE)), Ok(()));

        let unsigned: TransactionEnvelope = tx.clone().into();
        assert!(verify_signed(&tx, &unsigned).is_err());
        assert!(verify_signed(&tx, &signed_by(&tx, BOB)).is_err());

        let mut altered = tx.clone();
        altered.seq_num = SequenceNumber(99);
        assert!(verify_signed(&tx, &signed_by(&altered, ALICE)).is_err());
    }
}
