use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use super::error::{VerifyError, VerifyResult};
use crate::bytecode::Text;
use crate::bytecode::registers::Register;
use crate::call::CallTable;

/// Preflight verifier.
pub struct Verifier<'t> {
    calls: &'t CallTable,
    allow_no_return: bool,
}

impl<'t> Verifier<'t> {
    pub fn new(calls: &'t CallTable) -> Self {
        Self {
            calls,
            allow_no_return: false,
        }
    }

    /// Accept programs whose last instruction is not an exit.
    pub fn allow_no_return(mut self, allow: bool) -> Self {
        self.allow_no_return = allow;
        self
    }

    /// Verify a text section.
    pub fn verify(&self, text: Text<'_>) -> VerifyResult<()> {
        let result = self.check(text);
        match &result {
            Ok(()) => debug!("preflight passed for {} instructions", text.len()),
            Err(e) => debug!("preflight failed: {}", e),
        }
        result
    }

    fn check(&self, text: Text<'_>) -> VerifyResult<()> {
        if !text.is_well_formed() {
            return Err(VerifyError::IllegalLength {
                len: text.len_bytes(),
            });
        }

        let count = text.len();
        let mut idx = 0;
        let mut last = None;
        // second halves of wide loads; branches may not land on them
        let mut operand_slots = vec![false; count];
        let mut branches = Vec::new();

        while let Some(insn) = text.get(idx) {
            for reg in [insn.dst_reg(), insn.src_reg()] {
                if Register::from_raw(reg).is_none() {
                    return Err(VerifyError::IllegalRegister { insn_idx: idx, reg });
                }
            }

            if insn.is_wide() {
                if idx + 1 >= count {
                    return Err(VerifyError::TruncatedWideLoad { insn_idx: idx });
                }
                operand_slots[idx + 1] = true;
                last = Some(insn);
                idx += 2;
                continue;
            }

            if insn.is_call() {
                if !self.calls.is_recognized(insn.imm) {
                    return Err(VerifyError::IllegalCall {
                        insn_idx: idx,
                        call_id: insn.imm,
                    });
                }
            } else if insn.is_branch() {
                let target = insn.branch_target(idx);
                if target < 0 || target >= count as i64 {
                    return Err(VerifyError::IllegalJump {
                        insn_idx: idx,
                        target,
                    });
                }
                branches.push((idx, target));
            }

            last = Some(insn);
            idx += 1;
        }

        if let Some(&(insn_idx, target)) = branches
            .iter()
            .find(|&&(_, target)| operand_slots[target as usize])
        {
            return Err(VerifyError::IllegalJump { insn_idx, target });
        }

        if !self.allow_no_return && !last.is_some_and(|insn| insn.is_exit()) {
            return Err(VerifyError::NoReturn);
        }

        Ok(())
    }
}
