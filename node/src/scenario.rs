//! # Scenario Runner
//!
//! A scenario is a JSON document that describes a world (wrappers, rate
//! providers, pools, opening balances) and a list of operations. The runner
//! builds an in-memory vault over the reference collaborators, drives every
//! operation through the routers, and reports each outcome.
//!
//! Tokens, pools and accounts are named by symbol; ids are derived with
//! [`TokenId::from_symbol`]. A failed operation is recorded with its error
//! kind and the run moves on: the vault has already rolled it back.
//!
//! Amounts are raw integers in the scenario and decimal strings in the
//! report, so nothing is lost above `u64::MAX`.
//!
//! ```json
//! {
//!   "now": 1700000000,
//!   "pools": [{
//!     "name": "WETH-DAI",
//!     "curve": "constant_product",
//!     "tokens": [{ "symbol": "WETH" }, { "symbol": "DAI" }],
//!     "swap_fee_percentage": 10000000000000000
//!   }],
//!   "balances": [{ "account": "lp", "token": "WETH", "amount": 1000000000000000000000 }],
//!   "operations": [
//!     { "initialize": { "sender": "lp", "pool": "WETH-DAI", "amounts": { "WETH": 1, "DAI": 1 } } }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, info_span, warn};

use tidal_contracts::{
    ConstantProductPricing, ConstantSumPricing, LiquiditySurchargeHook, ManualRateProvider, RoleAuthorizer,
    SwapCapHook, SwapSurchargeHook, WrapperRateProvider, YieldWrapper,
};
use tidal_vault::external::{
    Action, Erc4626, InMemoryLedger, PoolHooks, PoolPricing, RateProvider, SwapKind, TokenLedger,
};
use tidal_vault::router::{
    Clock, FixedClock, Settlement, SingleSwap, SwapPathExactAmountIn, SwapPathExactAmountOut, SwapPathStep,
    SystemClock,
};
use tidal_vault::vault::{BufferWrapOrUnwrapParams, PoolRegistration, TokenConfig, WrappingDirection, VAULT_ACCOUNT};
use tidal_vault::{AccountId, BatchRouter, Router, SettlementMode, TokenId, Vault, VaultConfig, VaultError};

use crate::metrics::NodeMetrics;

// ---------------------------------------------------------------------------
// Scenario document
// ---------------------------------------------------------------------------

/// A full scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Vault parameters. Defaults when absent.
    #[serde(default)]
    pub vault: Option<VaultConfig>,
    /// Account holding every governance role.
    #[serde(default = "default_admin")]
    pub admin: String,
    /// Fixed Unix time for deadline checks. The system clock when absent.
    #[serde(default)]
    pub now: Option<u64>,
    #[serde(default)]
    pub wrappers: Vec<WrapperSpec>,
    #[serde(default)]
    pub rate_providers: Vec<RateProviderSpec>,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    /// Opening balances. Recipients approve both routers.
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_decimals() -> u8 {
    18
}

fn unbounded() -> u128 {
    u128::MAX
}

/// A yield-bearing wrapper of `underlying`, registered for buffer use.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WrapperSpec {
    pub wrapped: String,
    pub underlying: String,
}

/// A named rate provider pools can reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateProviderSpec {
    /// Fixed until a `set_rate` operation changes it.
    Manual { name: String, rate: u128 },
    /// Tracks a wrapper's redeem rate, refreshed by `refresh_rate`.
    Wrapper { name: String, wrapper: String },
}

/// Pricing curve of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    ConstantProduct,
    ConstantSum,
}

/// Optional pool hook.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookSpec {
    SwapCap(SwapCapHook),
    Surcharge(SwapSurchargeHook),
    LiquiditySurcharge(LiquiditySurchargeHook),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolTokenSpec {
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Name of a rate provider. Makes the token rate-bearing.
    #[serde(default)]
    pub rate_provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSpec {
    pub name: String,
    pub curve: Curve,
    pub tokens: Vec<PoolTokenSpec>,
    #[serde(default)]
    pub swap_fee_percentage: u128,
    #[serde(default)]
    pub aggregate_swap_fee_percentage: u128,
    #[serde(default)]
    pub hook: Option<HookSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceSpec {
    pub account: String,
    pub token: String,
    pub amount: u128,
}

/// One hop of a batch path. For a buffer hop `pool` names the wrapped token.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub pool: String,
    pub token_out: String,
    #[serde(default)]
    pub buffer: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathInSpec {
    pub token_in: String,
    pub steps: Vec<StepSpec>,
    pub amount_in: u128,
    #[serde(default)]
    pub min_amount_out: u128,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathOutSpec {
    pub token_in: String,
    pub steps: Vec<StepSpec>,
    #[serde(default = "unbounded")]
    pub max_amount_in: u128,
    pub amount_out: u128,
}

/// Per-token amounts keyed by symbol.
pub type Amounts = BTreeMap<String, u128>;

/// Everything a scenario can do after setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Fund {
        account: String,
        token: String,
        amount: u128,
    },
    Initialize {
        sender: String,
        pool: String,
        amounts: Amounts,
        #[serde(default)]
        min_bpt_out: u128,
        #[serde(default)]
        mode: SettlementMode,
    },
    AddProportional {
        sender: String,
        pool: String,
        bpt_out: u128,
        #[serde(default)]
        max_amounts_in: Option<Amounts>,
        #[serde(default)]
        mode: SettlementMode,
    },
    AddUnbalanced {
        sender: String,
        pool: String,
        amounts: Amounts,
        #[serde(default)]
        min_bpt_out: u128,
        #[serde(default)]
        mode: SettlementMode,
    },
    AddSingleTokenExactOut {
        sender: String,
        pool: String,
        token_in: String,
        bpt_out: u128,
        #[serde(default = "unbounded")]
        max_amount_in: u128,
        #[serde(default)]
        mode: SettlementMode,
    },
    RemoveProportional {
        sender: String,
        pool: String,
        bpt_in: u128,
        #[serde(default)]
        min_amounts_out: Amounts,
    },
    RemoveSingleTokenExactIn {
        sender: String,
        pool: String,
        bpt_in: u128,
        token_out: String,
        #[serde(default)]
        min_amount_out: u128,
    },
    RemoveSingleTokenExactOut {
        sender: String,
        pool: String,
        token_out: String,
        amount_out: u128,
        #[serde(default = "unbounded")]
        max_bpt_in: u128,
    },
    Swap {
        sender: String,
        pool: String,
        token_in: String,
        token_out: String,
        kind: SwapKind,
        amount: u128,
        #[serde(default)]
        limit: Option<u128>,
        #[serde(default)]
        deadline: Option<u64>,
        #[serde(default)]
        mode: SettlementMode,
    },
    QuoteSwap {
        pool: String,
        token_in: String,
        token_out: String,
        kind: SwapKind,
        amount: u128,
    },
    BatchExactIn {
        sender: String,
        paths: Vec<PathInSpec>,
        #[serde(default)]
        deadline: Option<u64>,
        #[serde(default)]
        mode: SettlementMode,
    },
    BatchExactOut {
        sender: String,
        paths: Vec<PathOutSpec>,
        #[serde(default)]
        deadline: Option<u64>,
        #[serde(default)]
        mode: SettlementMode,
    },
    InitializeBuffer {
        sender: String,
        wrapped: String,
        underlying_in: u128,
        wrapped_in: u128,
        #[serde(default)]
        min_shares: u128,
        #[serde(default)]
        mode: SettlementMode,
    },
    AddBufferLiquidity {
        sender: String,
        wrapped: String,
        shares_out: u128,
        #[serde(default = "unbounded")]
        max_underlying_in: u128,
        #[serde(default = "unbounded")]
        max_wrapped_in: u128,
        #[serde(default)]
        mode: SettlementMode,
    },
    RemoveBufferLiquidity {
        sender: String,
        wrapped: String,
        shares_in: u128,
        #[serde(default)]
        min_underlying_out: u128,
        #[serde(default)]
        min_wrapped_out: u128,
    },
    WrapOrUnwrap {
        sender: String,
        wrapped: String,
        direction: WrappingDirection,
        kind: SwapKind,
        amount: u128,
        #[serde(default)]
        limit: Option<u128>,
        #[serde(default)]
        mode: SettlementMode,
    },
    RebalanceBuffer {
        caller: String,
        wrapped: String,
    },
    AccrueYield {
        wrapped: String,
        amount: u128,
    },
    SetWrappingEnabled {
        wrapped: String,
        enabled: bool,
    },
    SetRate {
        provider: String,
        rate: u128,
    },
    RefreshRate {
        provider: String,
    },
    Grant {
        action: Action,
        account: String,
    },
    Revoke {
        action: Action,
        account: String,
    },
    PauseVault {
        caller: String,
    },
    UnpauseVault {
        caller: String,
    },
    PausePool {
        caller: String,
        pool: String,
    },
    UnpausePool {
        caller: String,
        pool: String,
    },
    SetSwapFee {
        caller: String,
        pool: String,
        fee: u128,
    },
    SetAggregateFee {
        caller: String,
        pool: String,
        fee: u128,
    },
    CollectFees {
        caller: String,
        pool: String,
    },
}

impl Operation {
    /// Stable snake_case name, used in the report and as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fund { .. } => "fund",
            Self::Initialize { .. } => "initialize",
            Self::AddProportional { .. } => "add_proportional",
            Self::AddUnbalanced { .. } => "add_unbalanced",
            Self::AddSingleTokenExactOut { .. } => "add_single_token_exact_out",
            Self::RemoveProportional { .. } => "remove_proportional",
            Self::RemoveSingleTokenExactIn { .. } => "remove_single_token_exact_in",
            Self::RemoveSingleTokenExactOut { .. } => "remove_single_token_exact_out",
            Self::Swap { .. } => "swap",
            Self::QuoteSwap { .. } => "quote_swap",
            Self::BatchExactIn { .. } => "batch_exact_in",
            Self::BatchExactOut { .. } => "batch_exact_out",
            Self::InitializeBuffer { .. } => "initialize_buffer",
            Self::AddBufferLiquidity { .. } => "add_buffer_liquidity",
            Self::RemoveBufferLiquidity { .. } => "remove_buffer_liquidity",
            Self::WrapOrUnwrap { .. } => "wrap_or_unwrap",
            Self::RebalanceBuffer { .. } => "rebalance_buffer",
            Self::AccrueYield { .. } => "accrue_yield",
            Self::SetWrappingEnabled { .. } => "set_wrapping_enabled",
            Self::SetRate { .. } => "set_rate",
            Self::RefreshRate { .. } => "refresh_rate",
            Self::Grant { .. } => "grant",
            Self::Revoke { .. } => "revoke",
            Self::PauseVault { .. } => "pause_vault",
            Self::UnpauseVault { .. } => "unpause_vault",
            Self::PausePool { .. } => "pause_pool",
            Self::UnpausePool { .. } => "unpause_pool",
            Self::SetSwapFee { .. } => "set_swap_fee",
            Self::SetAggregateFee { .. } => "set_aggregate_fee",
            Self::CollectFees { .. } => "collect_fees",
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Reads and parses a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse scenario {}", path.display()))
}

/// Reads, parses and validates a vault config file.
pub fn load_config(path: &Path) -> Result<VaultConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    VaultConfig::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started_at: String,
    pub operations: Vec<OperationRecord>,
    pub pools: Vec<Value>,
    pub buffers: Vec<Value>,
    pub reserves: Vec<Value>,
    /// Every token's vault ledger balance equals its recorded reserves.
    pub solvent: bool,
}

impl Report {
    /// Operations that reverted.
    pub fn failures(&self) -> usize {
        self.operations.iter().filter(|r| r.error.is_some()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Error kind of a vault failure, `scenario` for a malformed operation.
    pub kind: String,
    pub message: String,
}

impl ErrorRecord {
    fn from_error(err: &anyhow::Error) -> Self {
        let kind = match err.downcast_ref::<VaultError>() {
            Some(vault_err) => vault_err.kind().to_string(),
            None => "scenario".to_string(),
        };
        Self {
            kind,
            message: format!("{err:#}"),
        }
    }
}

fn amount(value: u128) -> Value {
    Value::String(value.to_string())
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The vault, its routers and the named collaborators of one run.
pub struct World {
    vault: Vault,
    router: Router,
    batch: BatchRouter,
    roles: Arc<RoleAuthorizer>,
    names: HashMap<TokenId, String>,
    wrappers: HashMap<String, Arc<YieldWrapper>>,
    manual_rates: HashMap<String, Arc<ManualRateProvider>>,
    wrapper_rates: HashMap<String, Arc<WrapperRateProvider>>,
    pools: Vec<String>,
}

impl World {
    /// Builds the world a scenario describes: wrappers, rate providers,
    /// pools and opening balances. Any failure here is fatal.
    pub fn build(scenario: &Scenario, config: VaultConfig) -> Result<Self> {
        let admin = AccountId::new(scenario.admin.clone());
        let roles = Arc::new(RoleAuthorizer::with_admin(&admin));
        let vault = Vault::new(config, roles.clone(), InMemoryLedger::new()).context("invalid vault config")?;
        let clock: Arc<dyn Clock> = match scenario.now {
            Some(now) => Arc::new(FixedClock(now)),
            None => Arc::new(SystemClock),
        };

        let mut world = Self {
            vault,
            router: Router::new(AccountId::new("router"), clock.clone()),
            batch: BatchRouter::new(AccountId::new("batch-router"), clock),
            roles,
            names: HashMap::new(),
            wrappers: HashMap::new(),
            manual_rates: HashMap::new(),
            wrapper_rates: HashMap::new(),
            pools: Vec::new(),
        };

        for spec in &scenario.wrappers {
            let wrapped = world.token(&spec.wrapped);
            let underlying = world.token(&spec.underlying);
            let wrapper = Arc::new(YieldWrapper::new(wrapped, underlying, AccountId::new(spec.wrapped.clone())));
            world
                .vault
                .register_wrapper(&admin, wrapper.clone())
                .with_context(|| format!("failed to register wrapper {}", spec.wrapped))?;
            world.wrappers.insert(spec.wrapped.clone(), wrapper);
        }

        for spec in &scenario.rate_providers {
            match spec {
                RateProviderSpec::Manual { name, rate } => {
                    world
                        .manual_rates
                        .insert(name.clone(), Arc::new(ManualRateProvider::new(*rate)));
                }
                RateProviderSpec::Wrapper { name, wrapper } => {
                    let wrapper = world.wrapper(wrapper)?;
                    let provider = WrapperRateProvider::new(wrapper, world.vault.bank())
                        .with_context(|| format!("failed to read rate for {name}"))?;
                    world.wrapper_rates.insert(name.clone(), Arc::new(provider));
                }
            }
        }

        for spec in &scenario.pools {
            world
                .register_pool(spec)
                .with_context(|| format!("failed to register pool {}", spec.name))?;
        }

        for grant in &scenario.balances {
            world
                .fund(&grant.account, &grant.token, grant.amount)
                .with_context(|| format!("failed to fund {} with {}", grant.account, grant.token))?;
        }

        info!(
            pools = world.pools.len(),
            wrappers = world.wrappers.len(),
            "world built"
        );
        Ok(world)
    }

    fn token(&mut self, symbol: &str) -> TokenId {
        let id = TokenId::from_symbol(symbol);
        self.names.entry(id).or_insert_with(|| symbol.to_string());
        id
    }

    fn name(&self, id: TokenId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn wrapper(&self, wrapped: &str) -> Result<Arc<YieldWrapper>> {
        self.wrappers
            .get(wrapped)
            .cloned()
            .ok_or_else(|| anyhow!("unknown wrapper {wrapped}"))
    }

    fn rate_provider(&self, name: &str) -> Result<Arc<dyn RateProvider>> {
        if let Some(provider) = self.manual_rates.get(name) {
            return Ok(provider.clone());
        }
        if let Some(provider) = self.wrapper_rates.get(name) {
            return Ok(provider.clone());
        }
        bail!("unknown rate provider {name}")
    }

    fn register_pool(&mut self, spec: &PoolSpec) -> Result<()> {
        let pool = self.token(&spec.name);
        let mut tokens = Vec::with_capacity(spec.tokens.len());
        for token in &spec.tokens {
            let id = self.token(&token.symbol);
            tokens.push(match &token.rate_provider {
                Some(name) => TokenConfig::with_rate(id, token.decimals, self.rate_provider(name)?),
                None => TokenConfig::standard(id, token.decimals),
            });
        }
        let pricing: Arc<dyn PoolPricing> = match spec.curve {
            Curve::ConstantProduct => Arc::new(ConstantProductPricing::new()),
            Curve::ConstantSum => Arc::new(ConstantSumPricing::new()),
        };
        let hooks: Option<Arc<dyn PoolHooks>> = match spec.hook {
            Some(HookSpec::SwapCap(cap)) => Some(Arc::new(cap)),
            Some(HookSpec::Surcharge(skim)) => Some(Arc::new(SwapSurchargeHook::new(skim.surcharge_percentage()))),
            Some(HookSpec::LiquiditySurcharge(skim)) => {
                Some(Arc::new(LiquiditySurchargeHook::new(skim.surcharge_percentage())))
            }
            None => None,
        };
        self.vault.register_pool(PoolRegistration {
            pool,
            tokens,
            swap_fee_percentage: spec.swap_fee_percentage,
            aggregate_swap_fee_percentage: spec.aggregate_swap_fee_percentage,
            pricing,
            hooks,
        })?;
        self.pools.push(spec.name.clone());
        Ok(())
    }

    /// Credits `amount` of `symbol` to `holder` and approves both routers.
    /// Wrapped tokens are minted through their wrapper so they stay backed.
    fn fund(&mut self, holder: &str, symbol: &str, amount: u128) -> Result<()> {
        let id = self.token(symbol);
        let owner = AccountId::new(holder);
        match self.wrappers.get(symbol).cloned() {
            Some(wrapper) => {
                let assets = wrapper.preview_mint(self.vault.bank(), amount)?;
                self.vault.bank_mut().mint(wrapper.asset(), &owner, assets)?;
                wrapper.mint(self.vault.bank_mut(), &owner, amount)?;
            }
            None => self.vault.bank_mut().mint(id, &owner, amount)?,
        }
        let router = self.router.account().clone();
        let batch = self.batch.account().clone();
        let bank = self.vault.bank_mut();
        bank.approve(id, &owner, &router, u128::MAX);
        bank.approve(id, &owner, &batch, u128::MAX);
        debug!(%owner, token = symbol, amount, "funded");
        Ok(())
    }

    /// `amounts` laid out in the pool's canonical token order.
    fn ordered(&self, pool: &str, amounts: &Amounts, missing: u128) -> Result<Vec<u128>> {
        let tokens = self.vault.get_pool_tokens(TokenId::from_symbol(pool))?;
        for symbol in amounts.keys() {
            if !tokens.contains(&TokenId::from_symbol(symbol)) {
                bail!("{symbol} is not a token of pool {pool}");
            }
        }
        Ok(tokens
            .iter()
            .map(|t| amounts.get(&self.name(*t)).copied().unwrap_or(missing))
            .collect())
    }

    fn by_token(&self, pool: TokenId, values: &[u128]) -> Result<Value> {
        let tokens = self.vault.get_pool_tokens(pool)?;
        let map: Map<String, Value> = tokens
            .iter()
            .zip(values)
            .map(|(t, v)| (self.name(*t), amount(*v)))
            .collect();
        Ok(Value::Object(map))
    }

    fn flows(&self, flows: &[(TokenId, u128)]) -> Value {
        let map: Map<String, Value> = flows.iter().map(|(t, v)| (self.name(*t), amount(*v))).collect();
        Value::Object(map)
    }

    fn settlement(&self, settlement: &Settlement) -> Value {
        json!({
            "paid_in": self.flows(&settlement.paid_in),
            "paid_out": self.flows(&settlement.paid_out),
        })
    }

    fn steps(&mut self, steps: &[StepSpec]) -> Vec<SwapPathStep> {
        steps
            .iter()
            .map(|step| {
                let pool = self.token(&step.pool);
                let out = self.token(&step.token_out);
                if step.buffer {
                    SwapPathStep::buffer(pool, out)
                } else {
                    SwapPathStep::swap(pool, out)
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Runs one operation and returns its result.
    pub fn execute(&mut self, op: &Operation, metrics: &NodeMetrics) -> Result<Value> {
        match op {
            Operation::Fund { account, token, amount: value } => {
                self.fund(account, token, *value)?;
                Ok(json!({ "balance": amount(self.balance(account, token)) }))
            }
            Operation::Initialize { sender, pool, amounts, min_bpt_out, mode } => {
                let exact = self.ordered(pool, amounts, 0)?;
                let bpt = self.router.initialize(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(pool),
                    &exact,
                    *min_bpt_out,
                    *mode,
                )?;
                Ok(json!({ "bpt_out": amount(bpt) }))
            }
            Operation::AddProportional { sender, pool, bpt_out, max_amounts_in, mode } => {
                let max = match max_amounts_in {
                    Some(limits) => self.ordered(pool, limits, u128::MAX)?,
                    None => self.ordered(pool, &Amounts::new(), u128::MAX)?,
                };
                let id = TokenId::from_symbol(pool);
                let paid = self.router.add_liquidity_proportional(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    id,
                    &max,
                    *bpt_out,
                    *mode,
                )?;
                Ok(json!({ "amounts_in": self.by_token(id, &paid)? }))
            }
            Operation::AddUnbalanced { sender, pool, amounts, min_bpt_out, mode } => {
                let exact = self.ordered(pool, amounts, 0)?;
                let bpt = self.router.add_liquidity_unbalanced(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(pool),
                    &exact,
                    *min_bpt_out,
                    *mode,
                )?;
                Ok(json!({ "bpt_out": amount(bpt) }))
            }
            Operation::AddSingleTokenExactOut { sender, pool, token_in, bpt_out, max_amount_in, mode } => {
                let token_in = self.token(token_in);
                let paid = self.router.add_liquidity_single_token_exact_out(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(pool),
                    token_in,
                    *max_amount_in,
                    *bpt_out,
                    *mode,
                )?;
                Ok(json!({ "amount_in": amount(paid) }))
            }
            Operation::RemoveProportional { sender, pool, bpt_in, min_amounts_out } => {
                let min = self.ordered(pool, min_amounts_out, 0)?;
                let id = TokenId::from_symbol(pool);
                let received = self.router.remove_liquidity_proportional(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    id,
                    *bpt_in,
                    &min,
                )?;
                Ok(json!({ "amounts_out": self.by_token(id, &received)? }))
            }
            Operation::RemoveSingleTokenExactIn { sender, pool, bpt_in, token_out, min_amount_out } => {
                let token_out = self.token(token_out);
                let out = self.router.remove_liquidity_single_token_exact_in(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(pool),
                    *bpt_in,
                    token_out,
                    *min_amount_out,
                )?;
                Ok(json!({ "amount_out": amount(out) }))
            }
            Operation::RemoveSingleTokenExactOut { sender, pool, token_out, amount_out, max_bpt_in } => {
                let token_out = self.token(token_out);
                let bpt = self.router.remove_liquidity_single_token_exact_out(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(pool),
                    *max_bpt_in,
                    token_out,
                    *amount_out,
                )?;
                Ok(json!({ "bpt_in": amount(bpt) }))
            }
            Operation::Swap { sender, pool, token_in, token_out, kind, amount: given, limit, deadline, mode } => {
                let swap = self.single_swap(pool, token_in, token_out, *kind, *given, *limit);
                let outcome = self.router.swap_single_token(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    *kind,
                    &swap,
                    deadline.unwrap_or(u64::MAX),
                    *mode,
                )?;
                Ok(json!({
                    "amount_in": amount(outcome.amount_in_raw),
                    "amount_out": amount(outcome.amount_out_raw),
                    "swap_fee": amount(outcome.swap_fee_raw),
                }))
            }
            Operation::QuoteSwap { pool, token_in, token_out, kind, amount: given } => {
                let swap = self.single_swap(pool, token_in, token_out, *kind, *given, None);
                let outcome = self.router.query_swap_single_token(&self.vault, *kind, &swap)?;
                Ok(json!({
                    "amount_in": amount(outcome.amount_in_raw),
                    "amount_out": amount(outcome.amount_out_raw),
                }))
            }
            Operation::BatchExactIn { sender, paths, deadline, mode } => {
                let paths: Vec<SwapPathExactAmountIn> = paths
                    .iter()
                    .map(|p| SwapPathExactAmountIn {
                        token_in: self.token(&p.token_in),
                        steps: self.steps(&p.steps),
                        exact_amount_in: p.amount_in,
                        min_amount_out: p.min_amount_out,
                    })
                    .collect();
                for path in &paths {
                    metrics.path_length.observe(path.steps.len() as f64);
                }
                let outcome = self.batch.swap_exact_in(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    &paths,
                    deadline.unwrap_or(u64::MAX),
                    *mode,
                )?;
                metrics.settled(outcome.settlement.paid_in.len(), outcome.settlement.paid_out.len());
                Ok(json!({
                    "amounts_out": outcome.path_amounts.iter().copied().map(amount).collect::<Vec<_>>(),
                    "settlement": self.settlement(&outcome.settlement),
                }))
            }
            Operation::BatchExactOut { sender, paths, deadline, mode } => {
                let paths: Vec<SwapPathExactAmountOut> = paths
                    .iter()
                    .map(|p| SwapPathExactAmountOut {
                        token_in: self.token(&p.token_in),
                        steps: self.steps(&p.steps),
                        max_amount_in: p.max_amount_in,
                        exact_amount_out: p.amount_out,
                    })
                    .collect();
                for path in &paths {
                    metrics.path_length.observe(path.steps.len() as f64);
                }
                let outcome = self.batch.swap_exact_out(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    &paths,
                    deadline.unwrap_or(u64::MAX),
                    *mode,
                )?;
                metrics.settled(outcome.settlement.paid_in.len(), outcome.settlement.paid_out.len());
                Ok(json!({
                    "amounts_in": outcome.path_amounts.iter().copied().map(amount).collect::<Vec<_>>(),
                    "settlement": self.settlement(&outcome.settlement),
                }))
            }
            Operation::InitializeBuffer { sender, wrapped, underlying_in, wrapped_in, min_shares, mode } => {
                let shares = self.router.initialize_buffer(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(wrapped),
                    *underlying_in,
                    *wrapped_in,
                    *min_shares,
                    *mode,
                )?;
                Ok(json!({ "shares_out": amount(shares) }))
            }
            Operation::AddBufferLiquidity { sender, wrapped, shares_out, max_underlying_in, max_wrapped_in, mode } => {
                let (underlying, wrapped_paid) = self.router.add_liquidity_to_buffer(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(wrapped),
                    *max_underlying_in,
                    *max_wrapped_in,
                    *shares_out,
                    *mode,
                )?;
                Ok(json!({ "underlying_in": amount(underlying), "wrapped_in": amount(wrapped_paid) }))
            }
            Operation::RemoveBufferLiquidity { sender, wrapped, shares_in, min_underlying_out, min_wrapped_out } => {
                let (underlying, wrapped_out) = self.router.remove_liquidity_from_buffer(
                    &mut self.vault,
                    &AccountId::new(sender.clone()),
                    TokenId::from_symbol(wrapped),
                    *shares_in,
                    *min_underlying_out,
                    *min_wrapped_out,
                )?;
                Ok(json!({ "underlying_out": amount(underlying), "wrapped_out": amount(wrapped_out) }))
            }
            Operation::WrapOrUnwrap { sender, wrapped, direction, kind, amount: given, limit, mode } => {
                let params = BufferWrapOrUnwrapParams {
                    kind: *kind,
                    direction: *direction,
                    wrapped: TokenId::from_symbol(wrapped),
                    amount_given_raw: *given,
                    limit_raw: limit.unwrap_or(default_limit(*kind)),
                };
                let outcome =
                    self.router
                        .wrap_or_unwrap(&mut self.vault, &AccountId::new(sender.clone()), &params, *mode)?;
                Ok(json!({
                    "amount_in": amount(outcome.amount_in_raw),
                    "amount_out": amount(outcome.amount_out_raw),
                    "used_wrapper": outcome.used_wrapper,
                }))
            }
            Operation::RebalanceBuffer { caller, wrapped } => {
                let outcome = self.router.rebalance_buffer(
                    &mut self.vault,
                    &AccountId::new(caller.clone()),
                    TokenId::from_symbol(wrapped),
                )?;
                Ok(json!({
                    "underlying_balance": amount(outcome.underlying_balance),
                    "wrapped_balance": amount(outcome.wrapped_balance),
                    "drift": amount(outcome.drift),
                }))
            }
            Operation::AccrueYield { wrapped, amount: value } => {
                let wrapper = self.wrapper(wrapped)?;
                wrapper.accrue_yield(self.vault.bank_mut(), *value)?;
                Ok(json!({ "total_assets": amount(wrapper.total_assets(self.vault.bank())) }))
            }
            Operation::SetWrappingEnabled { wrapped, enabled } => {
                self.wrapper(wrapped)?.set_wrapping_enabled(*enabled);
                Ok(json!({ "enabled": enabled }))
            }
            Operation::SetRate { provider, rate } => {
                let provider = self
                    .manual_rates
                    .get(provider)
                    .ok_or_else(|| anyhow!("unknown manual rate provider {provider}"))?;
                provider.set_rate(*rate);
                Ok(json!({ "rate": amount(*rate) }))
            }
            Operation::RefreshRate { provider } => {
                let provider = self
                    .wrapper_rates
                    .get(provider)
                    .ok_or_else(|| anyhow!("unknown wrapper rate provider {provider}"))?;
                let rate = provider.refresh(self.vault.bank())?;
                Ok(json!({ "rate": amount(rate) }))
            }
            Operation::Grant { action, account } => {
                let changed = self.roles.grant(*action, &AccountId::new(account.clone()));
                Ok(json!({ "changed": changed }))
            }
            Operation::Revoke { action, account } => {
                let changed = self.roles.revoke(*action, &AccountId::new(account.clone()));
                Ok(json!({ "changed": changed }))
            }
            Operation::PauseVault { caller } => {
                self.vault.pause_vault(&AccountId::new(caller.clone()))?;
                Ok(json!({ "paused": true }))
            }
            Operation::UnpauseVault { caller } => {
                self.vault.unpause_vault(&AccountId::new(caller.clone()))?;
                Ok(json!({ "paused": false }))
            }
            Operation::PausePool { caller, pool } => {
                self.vault
                    .pause_pool(&AccountId::new(caller.clone()), TokenId::from_symbol(pool))?;
                Ok(json!({ "paused": true }))
            }
            Operation::UnpausePool { caller, pool } => {
                self.vault
                    .unpause_pool(&AccountId::new(caller.clone()), TokenId::from_symbol(pool))?;
                Ok(json!({ "paused": false }))
            }
            Operation::SetSwapFee { caller, pool, fee } => {
                self.vault.set_static_swap_fee_percentage(
                    &AccountId::new(caller.clone()),
                    TokenId::from_symbol(pool),
                    *fee,
                )?;
                Ok(json!({ "swap_fee_percentage": amount(*fee) }))
            }
            Operation::SetAggregateFee { caller, pool, fee } => {
                self.vault.set_aggregate_swap_fee_percentage(
                    &AccountId::new(caller.clone()),
                    TokenId::from_symbol(pool),
                    *fee,
                )?;
                Ok(json!({ "aggregate_swap_fee_percentage": amount(*fee) }))
            }
            Operation::CollectFees { caller, pool } => {
                let collected = self.router.collect_aggregate_fees(
                    &mut self.vault,
                    &AccountId::new(caller.clone()),
                    TokenId::from_symbol(pool),
                )?;
                Ok(json!({ "collected": self.flows(&collected) }))
            }
        }
    }

    fn single_swap(
        &mut self,
        pool: &str,
        token_in: &str,
        token_out: &str,
        kind: SwapKind,
        given: u128,
        limit: Option<u128>,
    ) -> SingleSwap {
        SingleSwap {
            pool: self.token(pool),
            token_in: self.token(token_in),
            token_out: self.token(token_out),
            amount_given: given,
            limit: limit.unwrap_or(default_limit(kind)),
        }
    }

    /// Ledger balance of `holder` in `symbol`.
    pub fn balance(&self, holder: &str, symbol: &str) -> u128 {
        self.vault
            .bank()
            .balance_of(TokenId::from_symbol(symbol), &AccountId::new(holder))
    }

    // -----------------------------------------------------------------------
    // Final state
    // -----------------------------------------------------------------------

    fn pool_reports(&self) -> Vec<Value> {
        self.pools
            .iter()
            .filter_map(|name| {
                let state = self.vault.pool(TokenId::from_symbol(name)).ok()?;
                let tokens: Vec<Value> = state
                    .tokens()
                    .iter()
                    .zip(state.raw_balances())
                    .zip(state.aggregate_fees())
                    .map(|((t, balance), fee)| {
                        json!({
                            "token": self.name(*t),
                            "balance": amount(balance),
                            "aggregate_fees": amount(*fee),
                        })
                    })
                    .collect();
                Some(json!({
                    "pool": name,
                    "initialized": state.is_initialized(),
                    "paused": state.is_paused(),
                    "total_supply": amount(state.total_supply()),
                    "tokens": tokens,
                }))
            })
            .collect()
    }

    fn buffer_reports(&self) -> Vec<Value> {
        let mut wrapped: Vec<&String> = self.wrappers.keys().collect();
        wrapped.sort();
        wrapped
            .into_iter()
            .filter_map(|symbol| {
                let buffer = self.vault.buffer(TokenId::from_symbol(symbol)).ok()?;
                Some(json!({
                    "wrapped": symbol,
                    "underlying_balance": amount(buffer.underlying_balance()),
                    "wrapped_balance": amount(buffer.wrapped_balance()),
                    "total_shares": amount(buffer.total_shares()),
                }))
            })
            .collect()
    }

    /// Reserves against the vault's ledger balance, per token, and whether
    /// they all agree.
    fn reserve_reports(&self) -> (Vec<Value>, bool) {
        let vault_account = AccountId::new(VAULT_ACCOUNT);
        let mut tokens: Vec<(&String, TokenId)> = self.names.iter().map(|(id, name)| (name, *id)).collect();
        tokens.sort();
        let mut solvent = true;
        let reports = tokens
            .into_iter()
            .filter(|(_, id)| !self.vault.is_pool_registered(*id))
            .map(|(name, id)| {
                let reserves = self.vault.reserves_of(id);
                let held = self.vault.bank().balance_of(id, &vault_account);
                solvent &= reserves == held;
                json!({ "token": name, "reserves": amount(reserves), "vault_balance": amount(held) })
            })
            .collect();
        (reports, solvent)
    }
}

fn default_limit(kind: SwapKind) -> u128 {
    match kind {
        SwapKind::ExactIn => 0,
        SwapKind::ExactOut => u128::MAX,
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Builds the world and executes every operation in order.
pub fn run(scenario: &Scenario, config: VaultConfig, metrics: &NodeMetrics) -> Result<Report> {
    let started_at = Utc::now().to_rfc3339();
    let mut world = World::build(scenario, config)?;
    let mut operations = Vec::with_capacity(scenario.operations.len());

    for (index, op) in scenario.operations.iter().enumerate() {
        let span = info_span!("operation", index, op = op.name());
        let _entered = span.enter();
        let record = match world.execute(op, metrics) {
            Ok(result) => {
                metrics.executed(op.name());
                debug!("operation executed");
                OperationRecord {
                    index,
                    op: op.name(),
                    result: Some(result),
                    error: None,
                }
            }
            Err(err) => {
                let error = ErrorRecord::from_error(&err);
                metrics.failed(&error.kind);
                warn!(kind = %error.kind, error = %error.message, "operation reverted");
                OperationRecord {
                    index,
                    op: op.name(),
                    result: None,
                    error: Some(error),
                }
            }
        };
        operations.push(record);
    }

    let (reserves, solvent) = world.reserve_reports();
    let report = Report {
        started_at,
        operations,
        pools: world.pool_reports(),
        buffers: world.buffer_reports(),
        reserves,
        solvent,
    };
    info!(
        operations = report.operations.len(),
        failed = report.failures(),
        solvent,
        "scenario finished"
    );
    Ok(report)
}
