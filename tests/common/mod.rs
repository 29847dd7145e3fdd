//! Shared test support: a counting wrapper around the CPU module

use numw::arena::Arena;
use numw::cpu::CpuModule;
use numw::error::Result;
use numw::native::{ArgType, NativeBinding, NativeModule, NativeValue, ReturnKind};

/// CPU module that records every bind and invoke by symbol
#[derive(Debug, Default)]
pub struct MockModule {
    inner: CpuModule,
    pub bind_calls: Vec<String>,
    pub invoke_calls: Vec<String>,
    pub dispose_calls: Vec<i32>,
}

impl MockModule {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn binds_of(&self, symbol: &str) -> usize {
        self.bind_calls.iter().filter(|s| *s == symbol).count()
    }

    #[allow(dead_code)]
    pub fn invokes_of(&self, symbol: &str) -> usize {
        self.invoke_calls.iter().filter(|s| *s == symbol).count()
    }
}

impl NativeModule for MockModule {
    fn bind(
        &mut self,
        symbol: &str,
        signature: &[ArgType],
        returns: ReturnKind,
    ) -> Result<NativeBinding> {
        self.bind_calls.push(symbol.to_string());
        self.inner.bind(symbol, signature, returns)
    }

    fn invoke(
        &mut self,
        binding: &NativeBinding,
        arena: &mut Arena,
        args: &[NativeValue<'_>],
    ) -> Result<i32> {
        self.invoke_calls.push(binding.symbol.clone());
        self.inner.invoke(binding, arena, args)
    }

    fn register_tensor(&mut self, id: i32, size: usize, offset: usize) {
        self.inner.register_tensor(id, size, offset);
    }

    fn dispose_data(&mut self, id: i32) {
        self.dispose_calls.push(id);
        self.inner.dispose_data(id);
    }
}
