use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use core_aa::bundler::BundlerClient;
use core_aa::config::{load_network, NetworkConfig};
use core_aa::encoding::{self, parse_address, parse_bytes, user_op_from_json, user_op_to_json};
use core_aa::events::subscribe_sponsored;
use core_aa::paymaster::{self, PaymasterClient, SponsorContext, Validity};
use core_aa::{
    calls, recover_owner, sign_user_operation, user_operation_hash, BuildReport, NonceSource,
    ProviderChainQuery, RawTransactionIntent, TransactionIntent, UserOperation,
    UserOperationBuilder,
};
use ethers::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "core-aa", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the userOpHash of a UserOperation JSON file (offline).
    Hash(HashArgs),

    /// Print the counterfactual smart account address (and deployment status).
    Account(AccountArgs),

    /// Build an unsigned UserOperation and print it with its hash.
    Build(BuildArgs),

    /// Build, sign and submit a UserOperation through a bundler.
    Send(SendArgs),

    /// Stream UserOperationEvents sponsored by a paymaster.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct HashArgs {
    /// UserOperation JSON (camelCase fields, hex quantities).
    file: PathBuf,

    /// EntryPoint address.
    #[arg(long, env = "CORE_AA_ENTRYPOINT")]
    entrypoint: String,

    #[arg(long, env = "CORE_AA_CHAIN_ID")]
    chain_id: u64,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Network file (chainId, rpc, entryPoint, factory, ...).
    #[arg(long, default_value = "networks/sepolia.json", env = "CORE_AA_NETWORK")]
    network: PathBuf,

    /// Override the chain RPC URL (otherwise uses the network JSON).
    #[arg(long, env = "CORE_AA_RPC_URL")]
    rpc: Option<String>,

    /// Override the EntryPoint address from the network JSON.
    #[arg(long, env = "CORE_AA_ENTRYPOINT")]
    entrypoint: Option<String>,

    /// Override the SimpleAccountFactory address from the network JSON.
    #[arg(long, env = "CORE_AA_FACTORY")]
    factory: Option<String>,

    /// Smart account owner private key.
    ///
    /// Recommended: set via env var CORE_AA_OWNER_PRIVATE_KEY.
    #[arg(long, env = "CORE_AA_OWNER_PRIVATE_KEY", hide_env_values = true)]
    owner_private_key: Option<String>,

    /// Owner address, for commands that do not sign. Takes precedence over
    /// the private key.
    #[arg(long)]
    owner: Option<String>,

    /// CREATE2 salt for the smart account.
    #[arg(long, default_value_t = 0)]
    salt: u64,
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum NonceFrom {
    /// EntryPoint.getNonce(sender, 0)
    EntryPoint,
    /// eth_getTransactionCount(sender)
    TxCount,
}

#[derive(Args, Debug)]
struct IntentArgs {
    /// Intent JSON file (`to`, `value`, `data`, `nonce`, `maxFeePerGas`,
    /// `maxPriorityFeePerGas`). Flags below override its fields.
    #[arg(long)]
    intent: Option<PathBuf>,

    #[arg(long)]
    to: Option<String>,

    /// Wei, decimal or 0x hex.
    #[arg(long)]
    value: Option<String>,

    /// Calldata for the destination (0x hex).
    #[arg(long)]
    data: Option<String>,

    #[arg(long)]
    nonce: Option<String>,

    #[arg(long)]
    max_fee_per_gas: Option<String>,

    #[arg(long)]
    max_priority_fee_per_gas: Option<String>,

    /// Use this sender instead of the factory-derived account (no initCode).
    #[arg(long)]
    sender: Option<String>,

    #[arg(long, value_enum, default_value_t = NonceFrom::EntryPoint)]
    nonce_from: NonceFrom,

    /// Gas price multiplier in basis points (e.g. 15000 = 1.5x).
    ///
    /// Applied to network fee estimates, never to explicit fee flags.
    #[arg(long, default_value_t = 10000, env = "CORE_AA_FEE_MULTIPLIER_BPS")]
    fee_multiplier_bps: u64,

    /// Per-query timeout for nonce and fee lookups, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    query_timeout_ms: u64,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    intent: IntentArgs,

    /// Static paymaster to attach (paymasterAndData = paymaster ++ data).
    #[arg(long)]
    paymaster: Option<String>,

    /// Extra paymaster data (0x hex), used with --paymaster.
    #[arg(long, requires = "paymaster")]
    paymaster_data: Option<String>,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    intent: IntentArgs,

    /// Bundler RPC URL (otherwise uses bundlerUrl from the network JSON).
    #[arg(long, env = "CORE_AA_BUNDLER_URL")]
    bundler: Option<String>,

    /// Sponsor gas using an ERC-7677 paymaster web service.
    #[arg(long, default_value_t = false, conflicts_with = "paymaster")]
    sponsor_gas: bool,

    /// Paymaster RPC URL (otherwise uses paymasterUrl from the network JSON).
    #[arg(long, env = "CORE_AA_PAYMASTER_URL")]
    paymaster_url: Option<String>,

    /// Sponsorship policy id sent in the ERC-7677 context.
    #[arg(long, env = "CORE_AA_PAYMASTER_POLICY_ID")]
    policy_id: Option<String>,

    /// Optional webhookData to include in paymaster requests.
    #[arg(long, env = "CORE_AA_PAYMASTER_WEBHOOK_DATA")]
    webhook_data: Option<String>,

    /// Verifying paymaster address. With --paymaster-signer-key the
    /// sponsorship is signed locally; otherwise --paymaster-data is attached as is.
    #[arg(long)]
    paymaster: Option<String>,

    #[arg(long, requires = "paymaster")]
    paymaster_data: Option<String>,

    /// Key of the verifying paymaster's off-chain signer. Ignored without
    /// --paymaster; takes precedence over --paymaster-data.
    #[arg(long, env = "CORE_AA_PAYMASTER_SIGNER_KEY", hide_env_values = true)]
    paymaster_signer_key: Option<String>,

    /// Sponsorship expiry (unix seconds, 0 = none).
    #[arg(long, default_value_t = 0)]
    valid_until: u64,

    #[arg(long, default_value_t = 0)]
    valid_after: u64,

    /// Do not send the UserOperation; only build + estimate gas.
    #[arg(long)]
    dry_run: bool,

    /// Do not wait for the userOp receipt.
    #[arg(long)]
    no_wait: bool,

    /// Max seconds to wait for userOp receipt. Use 0 to disable timeout.
    #[arg(long, default_value_t = 180)]
    max_wait_seconds: u64,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Network file (chainId, rpc, entryPoint, ...).
    #[arg(long, default_value = "networks/sepolia.json", env = "CORE_AA_NETWORK")]
    network: PathBuf,

    #[arg(long, env = "CORE_AA_RPC_URL")]
    rpc: Option<String>,

    #[arg(long, env = "CORE_AA_ENTRYPOINT")]
    entrypoint: Option<String>,

    /// Paymaster whose sponsored operations are streamed.
    #[arg(long)]
    paymaster: String,

    /// First block to scan (defaults to the current head).
    #[arg(long)]
    from_block: Option<u64>,

    #[arg(long, default_value_t = 4000)]
    poll_interval_ms: u64,

    /// Exit after this many events.
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        // stdout is reserved for command output
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Hash(args) => cmd_hash(args),
        Command::Account(args) => cmd_account(args).await,
        Command::Build(args) => cmd_build(args).await,
        Command::Send(args) => cmd_send(args).await,
        Command::Watch(args) => cmd_watch(args).await,
    }
}

fn cmd_hash(args: HashArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    let op = user_op_from_json(&json)?;
    let entrypoint = parse_address(&args.entrypoint).context("invalid --entrypoint address")?;

    let hash = user_operation_hash(&op, entrypoint, args.chain_id);
    println!("userOpHash:     {}", encoding::fmt_h256(hash));

    if !op.signature.is_empty() {
        match recover_owner(&op, hash) {
            Some(signer) => println!("signedBy:       {}", encoding::fmt_address(signer)),
            None => println!("signedBy:       <signature does not recover>"),
        }
    }

    if let Some(pm) = paymaster::paymaster_address(&op.paymaster_and_data) {
        println!("paymaster:      {}", encoding::fmt_address(pm));
    }

    Ok(())
}

async fn cmd_account(args: AccountArgs) -> Result<()> {
    let net = network_config(&args.common)?;
    let provider = connect(&net).await?;

    let owner = owner_address(&args.common, net.chain_id)?;
    let factory = net
        .factory
        .ok_or_else(|| anyhow!("no factory: pass --factory or set factory in the network json"))?;

    let (account, deployed) =
        calls::account_address(provider, factory, owner, U256::from(args.common.salt)).await?;

    println!("chainId:        {}", net.chain_id);
    println!("entryPoint:     {}", net.entry_point);
    println!("factory:        {}", factory);
    println!("owner:          {}", owner);
    println!("smartAccount:   {}", account);
    println!("isDeployed:     {}", deployed);

    Ok(())
}

async fn cmd_build(args: BuildArgs) -> Result<()> {
    let net = network_config(&args.common)?;
    let provider = connect(&net).await?;
    // only needed to derive the account from the factory
    let owner = match args.intent.sender {
        Some(_) => None,
        None => Some(owner_address(&args.common, net.chain_id)?),
    };

    let paymaster_and_data = match args.paymaster.as_deref() {
        Some(pm) => {
            let pm = parse_address(pm).context("invalid --paymaster address")?;
            let extra = optional_bytes(args.paymaster_data.as_deref(), "--paymaster-data")?;
            paymaster::paymaster_and_data(pm, &extra)
        }
        None => Bytes::default(),
    };

    let (op, report) = build_user_op(
        provider,
        &net,
        &args.common,
        &args.intent,
        owner,
        paymaster_and_data,
    )
    .await?;

    let hash = user_operation_hash(&op, net.entry_point, net.chain_id);
    println!(
        "UserOperation (unsigned):\n{}",
        serde_json::to_string_pretty(&user_op_to_json(&op))?
    );
    println!("\nuserOpHash:     {}", encoding::fmt_h256(hash));
    print_report(&report);

    Ok(())
}

async fn cmd_send(args: SendArgs) -> Result<()> {
    let net = network_config(&args.common)?;
    let provider = connect(&net).await?;
    let wallet = load_owner(&args.common, net.chain_id)?;
    let owner = wallet.address();

    let bundler_url = args
        .bundler
        .clone()
        .or_else(|| net.bundler_url.clone())
        .ok_or_else(|| anyhow!("no bundler: pass --bundler or set bundlerUrl in the network json"))?;
    let bundler = BundlerClient::new(bundler_url);

    let bundler_chain_id = bundler.chain_id().await?;
    if bundler_chain_id != net.chain_id {
        return Err(anyhow!(
            "chainId mismatch: network has {}, bundler returned {}",
            net.chain_id,
            bundler_chain_id
        ));
    }
    match bundler.supported_entry_points().await {
        Ok(eps) if !eps.contains(&net.entry_point) => {
            tracing::warn!(entry_point = %net.entry_point, "bundler does not list this EntryPoint")
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "eth_supportedEntryPoints failed"),
    }

    let sponsorship = Sponsorship::from_args(&args, &net)?;

    let (mut op, report) = build_user_op(
        provider,
        &net,
        &args.common,
        &args.intent,
        Some(owner),
        Bytes::default(),
    )
    .await?;
    print_report(&report);

    // Estimation needs paymasterAndData of the final length and a well-formed signature.
    op = sponsorship.stub(op, &net).await?;
    let signed = sign_user_operation(op, net.entry_point, net.chain_id, Some(&wallet)).await?;

    let gas = bundler
        .estimate_user_operation_gas(&signed, net.entry_point)
        .await
        .context("bundler gas estimate failed")?;

    let op = signed.into_unsigned().with_gas_estimates(gas);
    let op = sponsorship.finalize(op, &net).await?;

    // Re-sign with final gas limits + final paymasterAndData.
    let signed = sign_user_operation(op, net.entry_point, net.chain_id, Some(&wallet)).await?;

    println!(
        "\nUserOperation (final):\n{}",
        serde_json::to_string_pretty(&user_op_to_json(&signed))?
    );
    println!("\nuserOpHash (local): {}", encoding::fmt_h256(signed.hash()));

    if args.dry_run {
        println!("\n--dry-run set: not sending user operation.");
        return Ok(());
    }

    let user_op_hash = bundler
        .send_user_operation(&signed, net.entry_point)
        .await
        .context("bundler send failed")?;

    println!("\nuserOpHash: {}", encoding::fmt_h256(user_op_hash));

    if args.no_wait {
        println!("--no-wait set: not waiting for receipt.");
        return Ok(());
    }

    let receipt = bundler
        .wait_user_operation_receipt(user_op_hash, Duration::from_secs(args.max_wait_seconds))
        .await
        .context("failed waiting for userOp receipt")?;

    println!(
        "\nUserOp receipt:\n{}",
        serde_json::to_string_pretty(&receipt)?
    );

    Ok(())
}

async fn cmd_watch(args: WatchArgs) -> Result<()> {
    let mut net = load_network(&args.network, args.rpc.clone())?;
    if let Some(ep) = args.entrypoint.as_deref() {
        net.entry_point = parse_address(ep).context("invalid --entrypoint address")?;
    }
    let provider = connect(&net).await?;
    let paymaster = parse_address(&args.paymaster).context("invalid --paymaster address")?;

    let from_block = match args.from_block {
        Some(b) => b,
        None => provider.get_block_number().await?.as_u64(),
    };

    tracing::info!(
        entry_point = %net.entry_point,
        %paymaster,
        from_block,
        "watching sponsored user operations"
    );

    let mut sub = subscribe_sponsored(
        provider,
        net.entry_point,
        paymaster,
        from_block,
        Duration::from_millis(args.poll_interval_ms),
    );

    let mut seen = 0usize;
    while let Some(ev) = sub.recv().await {
        let out = serde_json::json!({
            "userOpHash": encoding::fmt_h256(ev.user_op_hash),
            "sender": encoding::fmt_address(ev.sender),
            "paymaster": encoding::fmt_address(ev.paymaster),
            "nonce": encoding::fmt_u256(ev.nonce),
            "success": ev.success,
            "actualGasCost": encoding::fmt_u256(ev.actual_gas_cost),
            "actualGasUsed": encoding::fmt_u256(ev.actual_gas_used),
            "blockNumber": ev.block_number,
            "transactionHash": ev.transaction_hash.map(encoding::fmt_h256),
        });
        println!("{}", out);

        seen += 1;
        if args.limit.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    sub.cancel();
    Ok(())
}

/// How `send` fills paymasterAndData.
enum Sponsorship {
    None,
    Static(Bytes),
    Erc7677 {
        client: PaymasterClient,
        ctx: SponsorContext,
    },
    Verifying {
        paymaster: Address,
        signer: LocalWallet,
        validity: Validity,
    },
}

impl Sponsorship {
    fn from_args(args: &SendArgs, net: &NetworkConfig) -> Result<Self> {
        if args.sponsor_gas {
            let url = args
                .paymaster_url
                .clone()
                .or_else(|| net.paymaster_url.clone())
                .ok_or_else(|| {
                    anyhow!("--sponsor-gas requires --paymaster-url (or CORE_AA_PAYMASTER_URL)")
                })?;
            let policy_id = args.policy_id.clone().ok_or_else(|| {
                anyhow!("--sponsor-gas requires --policy-id (or CORE_AA_PAYMASTER_POLICY_ID)")
            })?;
            return Ok(Self::Erc7677 {
                client: PaymasterClient::new(url),
                ctx: SponsorContext {
                    policy_id,
                    webhook_data: args.webhook_data.clone(),
                },
            });
        }

        let Some(pm) = args.paymaster.as_deref() else {
            return Ok(Self::None);
        };
        let paymaster = parse_address(pm).context("invalid --paymaster address")?;

        match args.paymaster_signer_key.as_deref() {
            Some(key) => Ok(Self::Verifying {
                paymaster,
                signer: LocalWallet::from_str(key)
                    .context("invalid paymaster signer key")?
                    .with_chain_id(net.chain_id),
                validity: Validity {
                    valid_until: args.valid_until,
                    valid_after: args.valid_after,
                },
            }),
            None => {
                let extra = optional_bytes(args.paymaster_data.as_deref(), "--paymaster-data")?;
                Ok(Self::Static(paymaster::paymaster_and_data(paymaster, &extra)))
            }
        }
    }

    /// paymasterAndData good enough for gas estimation.
    async fn stub(&self, op: UserOperation, net: &NetworkConfig) -> Result<UserOperation> {
        match self {
            Self::Erc7677 { client, ctx } => {
                println!("requesting paymaster stub data (pm_getPaymasterStubData)...");
                let stub = client
                    .get_paymaster_stub_data(&op, net.entry_point, net.chain_id, ctx)
                    .await?;
                Ok(UserOperation {
                    paymaster_and_data: stub,
                    ..op
                })
            }
            _ => self.finalize(op, net).await,
        }
    }

    async fn finalize(&self, op: UserOperation, net: &NetworkConfig) -> Result<UserOperation> {
        match self {
            Self::None => Ok(op),
            Self::Static(data) => Ok(UserOperation {
                paymaster_and_data: data.clone(),
                signature: Bytes::default(),
                ..op
            }),
            Self::Erc7677 { client, ctx } => {
                println!("requesting paymaster final data (pm_getPaymasterData)...");
                let data = client
                    .get_paymaster_data(&op, net.entry_point, net.chain_id, ctx)
                    .await?;
                Ok(UserOperation {
                    paymaster_and_data: data,
                    signature: Bytes::default(),
                    ..op
                })
            }
            Self::Verifying {
                paymaster,
                signer,
                validity,
            } => Ok(
                paymaster::sponsor(op, *paymaster, net.chain_id, *validity, Some(signer)).await?,
            ),
        }
    }
}

async fn build_user_op(
    provider: Arc<Provider<Http>>,
    net: &NetworkConfig,
    common: &CommonArgs,
    args: &IntentArgs,
    owner: Option<Address>,
    paymaster_and_data: Bytes,
) -> Result<(UserOperation, BuildReport)> {
    let intent = load_intent(args)?;

    let (sender, init_code) = match args.sender.as_deref() {
        Some(s) => (
            parse_address(s).context("invalid --sender address")?,
            Bytes::default(),
        ),
        None => {
            let factory = net.factory.ok_or_else(|| {
                anyhow!("no factory: pass --factory, --sender, or set factory in the network json")
            })?;
            let owner = owner.ok_or_else(|| anyhow!("an owner is required without --sender"))?;
            let salt = U256::from(common.salt);
            let (account, deployed) =
                calls::account_address(provider.clone(), factory, owner, salt).await?;
            let init_code = if deployed {
                Bytes::default()
            } else {
                tracing::info!(%account, "account not deployed yet; including initCode");
                calls::init_code(factory, owner, salt)
            };
            (account, init_code)
        }
    };

    let nonce_source = match args.nonce_from {
        NonceFrom::EntryPoint => NonceSource::EntryPoint(net.entry_point),
        NonceFrom::TxCount => NonceSource::TransactionCount,
    };
    let chain = ProviderChainQuery::new(provider).with_nonce_source(nonce_source);

    let builder = UserOperationBuilder::new(chain)
        .fee_multiplier_bps(args.fee_multiplier_bps)
        .query_timeout(Duration::from_millis(args.query_timeout_ms));

    Ok(builder
        .build_with_report(sender, &intent, init_code, paymaster_and_data)
        .await?)
}

fn load_intent(args: &IntentArgs) -> Result<TransactionIntent> {
    let mut raw = match args.intent.as_ref() {
        Some(path) => {
            let s = fs::read_to_string(path)
                .with_context(|| format!("failed to read intent json at {}", path.display()))?;
            serde_json::from_str::<RawTransactionIntent>(&s)
                .with_context(|| format!("failed to parse intent json at {}", path.display()))?
        }
        None => RawTransactionIntent::default(),
    };

    let overrides = [
        (&mut raw.to, &args.to),
        (&mut raw.value, &args.value),
        (&mut raw.data, &args.data),
        (&mut raw.nonce, &args.nonce),
        (&mut raw.max_fee_per_gas, &args.max_fee_per_gas),
        (&mut raw.max_priority_fee_per_gas, &args.max_priority_fee_per_gas),
    ];
    for (field, flag) in overrides {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }

    Ok(TransactionIntent::try_from(raw)?)
}

fn print_report(report: &BuildReport) {
    if report.nonce_fallback {
        println!("warning: nonce query failed; nonce defaulted to 0");
    }
    if report.fee_fallback {
        println!("warning: fee query failed; fee caps defaulted to 1 gwei");
    }
}

fn network_config(common: &CommonArgs) -> Result<NetworkConfig> {
    let mut net = load_network(&common.network, common.rpc.clone())?;
    if let Some(ep) = common.entrypoint.as_deref() {
        net.entry_point = parse_address(ep).context("invalid --entrypoint address")?;
    }
    if let Some(f) = common.factory.as_deref() {
        net.factory = Some(parse_address(f).context("invalid --factory address")?);
    }
    Ok(net)
}

async fn connect(net: &NetworkConfig) -> Result<Arc<Provider<Http>>> {
    let provider =
        Provider::<Http>::try_from(net.rpc_url.as_str())?.interval(Duration::from_millis(350));

    let chain_id = provider.get_chainid().await?.as_u64();
    if chain_id != net.chain_id {
        return Err(anyhow!(
            "chainId mismatch: network has {}, RPC returned {}",
            net.chain_id,
            chain_id
        ));
    }

    Ok(Arc::new(provider))
}

fn load_owner(common: &CommonArgs, chain_id: u64) -> Result<LocalWallet> {
    let owner_pk = common
        .owner_private_key
        .as_deref()
        .ok_or_else(|| anyhow!("missing CORE_AA_OWNER_PRIVATE_KEY (or --owner-private-key)"))?;
    let wallet = LocalWallet::from_str(owner_pk).context("invalid owner private key")?;
    Ok(wallet.with_chain_id(chain_id))
}

fn owner_address(common: &CommonArgs, chain_id: u64) -> Result<Address> {
    match common.owner.as_deref() {
        Some(owner) => parse_address(owner).context("invalid --owner address"),
        None => Ok(load_owner(common, chain_id)?.address()),
    }
}

fn optional_bytes(s: Option<&str>, flag: &str) -> Result<Vec<u8>> {
    match s {
        Some(s) => Ok(parse_bytes(s)
            .with_context(|| format!("invalid {flag}"))?
            .to_vec()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn intent_flags_override_file_fields() {
        let dir = std::env::temp_dir().join("core-aa-intent-override");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("intent.json");
        fs::write(
            &path,
            r#"{ "to": "0x1111111111111111111111111111111111111111", "value": "5", "data": "0xabcd" }"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "core-aa",
            "build",
            "--intent",
            path.to_str().unwrap(),
            "--value",
            "0x10",
        ])
        .unwrap();
        let Command::Build(args) = cli.cmd else {
            panic!("expected build");
        };

        let intent = load_intent(&args.intent).unwrap();
        assert_eq!(
            intent.to,
            Some(Address::from_str("0x1111111111111111111111111111111111111111").unwrap())
        );
        assert_eq!(intent.value, U256::from(16u64));
        assert_eq!(intent.data.to_vec(), vec![0xab, 0xcd]);
        assert_eq!(intent.nonce, None);
    }

    #[test]
    fn intent_without_destination_is_rejected() {
        let cli = Cli::try_parse_from(["core-aa", "build", "--value", "1"]).unwrap();
        let Command::Build(args) = cli.cmd else {
            panic!("expected build");
        };
        assert!(load_intent(&args.intent).is_err());
    }

    #[test]
    fn paymaster_data_requires_paymaster() {
        assert!(Cli::try_parse_from(["core-aa", "build", "--paymaster-data", "0x01"]).is_err());
    }
}
