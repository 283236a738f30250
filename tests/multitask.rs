use rust_mtl::bidaf::HeadlessBiDAF;
use rust_mtl::encoders::{HeadlessPairEncoder, HeadlessSentEncoder, PhraseEncoder};
use rust_mtl::modules::{
    BasicTextFieldEmbedder, FeedForwardEncoder, LinearSimilarity, PassThroughEncoder,
};
use rust_mtl::multitask::{
    mse_loss, ClassifierType, MultiTaskConfig, MultiTaskModel, PairEncoder, PairEncoderType,
    Scorer, Task,
};
use rust_mtl::{Activation, Config, MtlError};
use std::io::Write;
use std::str::FromStr;
use tch::{nn, no_grad, Device, Tensor};

const VOCAB_SIZE: i64 = 30;
const ENCODING_DIM: i64 = 4;
const MODELING_DIM: i64 = 6;

fn phrase_encoder(
    vs: &nn::VarStore,
    name: &str,
    embedder: &BasicTextFieldEmbedder,
) -> anyhow::Result<PhraseEncoder> {
    Ok(PhraseEncoder::new(
        vs.root() / name,
        Box::new(embedder.share()),
        1,
        Box::new(PassThroughEncoder::new(ENCODING_DIM)),
        0.0,
        true,
    )?)
}

fn build_model(vs: &nn::VarStore, pair_encoder_type: PairEncoderType) -> anyhow::Result<MultiTaskModel> {
    let embedder = BasicTextFieldEmbedder::new(vs.root() / "embedder", VOCAB_SIZE, ENCODING_DIM);
    let sent_encoder = HeadlessSentEncoder::new(phrase_encoder(vs, "sent", &embedder)?);
    let pair_phrase_encoder = phrase_encoder(vs, "pair", &embedder)?;
    let pair_encoder = match pair_encoder_type {
        PairEncoderType::bidaf => PairEncoder::BiDAF(HeadlessBiDAF::new(
            pair_phrase_encoder,
            Box::new(LinearSimilarity::new(vs.root() / "similarity", ENCODING_DIM)),
            Box::new(FeedForwardEncoder::new(
                vs.root() / "modeling",
                4 * ENCODING_DIM,
                MODELING_DIM,
                Activation::relu,
            )),
            0.0,
            true,
        )?),
        PairEncoderType::simple => PairEncoder::Simple(HeadlessPairEncoder::new(pair_phrase_encoder)),
    };
    Ok(MultiTaskModel::new(sent_encoder, pair_encoder))
}

/// Zeroes the classifier weight registered under `prefix` and sets its bias, so that the head
/// outputs `bias` for every input.
fn fix_logits(vs: &nn::VarStore, prefix: &str, bias: &[f32]) -> anyhow::Result<()> {
    let mut variables = vs.variables();
    let mut weight = variables
        .remove(&format!("{prefix}.classifier.weight"))
        .ok_or_else(|| anyhow::anyhow!("missing classifier weight"))?;
    let mut classifier_bias = variables
        .remove(&format!("{prefix}.classifier.bias"))
        .ok_or_else(|| anyhow::anyhow!("missing classifier bias"))?;
    no_grad(|| {
        let _ = weight.fill_(0.0);
        classifier_bias.copy_(&Tensor::from_slice(bias));
    });
    Ok(())
}

fn question() -> Tensor {
    Tensor::from_slice(&[4i64, 9, 0, 2, 3, 1]).view([2, 3])
}

fn passage() -> Tensor {
    Tensor::from_slice(&[7i64, 8, 11, 0, 5, 6, 0, 0]).view([2, 4])
}

#[test]
fn routed_dimensions() -> anyhow::Result<()> {
    let sentence_task = Task::new("sst", 2, false)?;
    let pair_task = Task::new("rte", 2, true)?;

    let vs = nn::VarStore::new(Device::Cpu);
    let bidaf_model = build_model(&vs, PairEncoderType::bidaf)?;
    assert_eq!(bidaf_model.pair_encoder_type(), PairEncoderType::bidaf);
    assert_eq!(bidaf_model.input_dim_for(&pair_task), 22);
    assert_eq!(bidaf_model.input_dim_for(&sentence_task), 4);

    let vs = nn::VarStore::new(Device::Cpu);
    let simple_model = build_model(&vs, PairEncoderType::simple)?;
    assert_eq!(simple_model.input_dim_for(&pair_task), 16);
    assert_eq!(simple_model.input_dim_for(&sentence_task), 4);
    Ok(())
}

#[test]
fn unregistered_task() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = build_model(&vs, PairEncoderType::bidaf)?;
    let task = Task::new("cola", 2, false)?;

    let result = model.forward_t(&task, &question(), None, None, false);
    assert!(matches!(result, Err(MtlError::UnregisteredTaskError(name)) if name == "cola"));
    Ok(())
}

#[test]
fn missing_pair_input() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::simple)?;
    let task = Task::new("qqp", 2, true)?;
    model.build_classifier(vs.root() / "qqp", &task, ClassifierType::log_reg, 16, 0, 0.0)?;

    let result = model.forward_t(&task, &question(), None, None, false);
    assert!(matches!(result, Err(MtlError::MissingPairInputError(_))));
    Ok(())
}

#[test]
fn sentence_task_ignores_second_input() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::bidaf)?;
    let task = Task::new("sst", 3, false)?;
    model.build_classifier(vs.root() / "sst", &task, ClassifierType::mlp, 4, 5, 0.0)?;

    let without_second = model.forward_t(&task, &question(), None, None, false)?;
    let with_second = model.forward_t(&task, &question(), Some(&passage()), None, false)?;
    assert_eq!(without_second.logits.size(), vec![2, 3]);
    assert!(without_second.logits.equal(&with_second.logits));
    assert!(without_second.loss.is_none());
    Ok(())
}

#[test]
fn cross_entropy_fallback() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::bidaf)?;
    let task = Task::new("rte", 2, true)?;
    model.build_classifier(vs.root() / "rte", &task, ClassifierType::log_reg, 22, 0, 0.0)?;
    fix_logits(&vs, "rte", &[2.0, -1.0])?;

    let question = Tensor::from_slice(&[4i64, 9]).view([1, 2]);
    let passage = Tensor::from_slice(&[7i64, 8, 11]).view([1, 3]);
    let label = Tensor::from_slice(&[0i64]);
    let output = model.forward_t(&task, &question, Some(&passage), Some(&label), false)?;

    let logits = Vec::<f32>::try_from(output.logits.view([-1]))?;
    assert!((logits[0] - 2.0).abs() < 1e-6);
    assert!((logits[1] + 1.0).abs() < 1e-6);
    let loss = output
        .loss
        .ok_or_else(|| anyhow::anyhow!("missing loss"))?
        .double_value(&[]);
    assert!((loss - (1.0 + (-3.0f64).exp()).ln()).abs() < 1e-5);
    assert!((task.get_metric(true) - 1.0).abs() < 1e-12);
    assert_eq!(task.get_metric(false), 0.0);
    Ok(())
}

#[test]
fn custom_loss_updates_average_scorer() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::simple)?;
    let task = Task::new("sts-b", 1, true)?
        .with_loss(Box::new(mse_loss))
        .with_scorer(Scorer::average());
    model.build_classifier(vs.root() / "sts", &task, ClassifierType::log_reg, 16, 0, 0.0)?;
    fix_logits(&vs, "sts", &[0.5])?;

    let labels = Tensor::from_slice(&[1.5f32, -0.5]).view([2, 1]);
    let output = model.forward_t(&task, &question(), Some(&passage()), Some(&labels), false)?;
    let loss = output
        .loss
        .ok_or_else(|| anyhow::anyhow!("missing loss"))?
        .double_value(&[]);
    assert!((loss - 1.0).abs() < 1e-6);

    let labels = Tensor::from_slice(&[0.5f32, 2.5]);
    model.forward_t(&task, &question(), Some(&passage()), Some(&labels), false)?;
    assert!((task.get_metric(false) - 1.5).abs() < 1e-6);
    Ok(())
}

#[test]
fn invalid_classifier_kind() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = build_model(&vs, PairEncoderType::bidaf)?;

    let result = ClassifierType::from_str("random_forest");
    assert!(matches!(result, Err(MtlError::InvalidClassifierKind(_))));
    assert!(!model.has_classifier("random_forest"));
    Ok(())
}

#[test]
fn classifier_input_dimension_checked() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::bidaf)?;
    let task = Task::new("mnli", 3, true)?;

    let result = model.build_classifier(vs.root() / "mnli", &task, ClassifierType::mlp, 16, 8, 0.0);
    assert!(matches!(result, Err(MtlError::InvalidConfigurationError(_))));
    assert!(!model.has_classifier("mnli"));
    Ok(())
}

#[test]
fn last_registration_wins() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::simple)?;
    let task = Task::new("mrpc", 2, true)?;
    model.build_classifier(vs.root() / "mrpc", &task, ClassifierType::log_reg, 16, 0, 0.0)?;
    fix_logits(&vs, "mrpc", &[1.0, 0.0])?;
    model.build_classifier(vs.root() / "mrpc_v2", &task, ClassifierType::mlp, 16, 4, 0.0)?;
    fix_logits(&vs, "mrpc_v2", &[-3.0, 3.0])?;

    let output = model.forward_t(&task, &question(), Some(&passage()), None, false)?;
    let expected = Tensor::from_slice(&[-3f32, 3., -3., 3.]).view([2, 2]);
    assert!(output.logits.allclose(&expected, 1e-6, 1e-6, false));
    Ok(())
}

#[test]
fn end_to_end_training_step() -> anyhow::Result<()> {
    for pair_encoder_type in [PairEncoderType::bidaf, PairEncoderType::simple] {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut model = build_model(&vs, pair_encoder_type)?;
        let pair_task = Task::new("qnli", 2, true)?;
        let sentence_task = Task::new("sst", 2, false)?;
        let pair_dim = model.input_dim_for(&pair_task);
        model.build_classifier(vs.root() / "qnli", &pair_task, ClassifierType::fancy_mlp, pair_dim, 8, 0.1)?;
        model.build_classifier(vs.root() / "sst", &sentence_task, ClassifierType::mlp, 4, 8, 0.1)?;

        let labels = Tensor::from_slice(&[1i64, 0]);
        let pair_output =
            model.forward_t(&pair_task, &question(), Some(&passage()), Some(&labels), true)?;
        let sentence_output = model.forward_t(&sentence_task, &passage(), None, Some(&labels), true)?;
        assert_eq!(pair_output.logits.size(), vec![2, 2]);
        assert_eq!(sentence_output.logits.size(), vec![2, 2]);

        let loss = pair_output
            .loss
            .ok_or_else(|| anyhow::anyhow!("missing loss"))?
            + sentence_output
                .loss
                .ok_or_else(|| anyhow::anyhow!("missing loss"))?;
        assert!(loss.double_value(&[]).is_finite());
        loss.backward();
    }
    Ok(())
}

#[test]
fn batch_rows_are_independent() -> anyhow::Result<()> {
    let first_inputs = Tensor::from_slice(&[4i64, 9, 0, 2, 3, 1, 7, 0, 0]).view([3, 3]);
    let second_inputs = Tensor::from_slice(&[7i64, 8, 11, 0, 5, 6, 0, 0, 2, 14, 9, 3]).view([3, 4]);
    let permutation = Tensor::from_slice(&[2i64, 0, 1]);
    let permuted_first = first_inputs.index_select(0, &permutation);
    let permuted_second = second_inputs.index_select(0, &permutation);

    for pair_encoder_type in [PairEncoderType::bidaf, PairEncoderType::simple] {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut model = build_model(&vs, pair_encoder_type)?;
        let pair_task = Task::new("wnli", 2, true)?;
        let sentence_task = Task::new("cola", 2, false)?;
        let pair_dim = model.input_dim_for(&pair_task);
        model.build_classifier(vs.root() / "wnli", &pair_task, ClassifierType::mlp, pair_dim, 5, 0.0)?;
        model.build_classifier(vs.root() / "cola", &sentence_task, ClassifierType::fancy_mlp, 4, 5, 0.0)?;

        let reference = model.forward_t(&pair_task, &first_inputs, Some(&second_inputs), None, false)?;
        let permuted = model.forward_t(&pair_task, &permuted_first, Some(&permuted_second), None, false)?;
        assert!(reference
            .logits
            .index_select(0, &permutation)
            .allclose(&permuted.logits, 1e-6, 1e-6, false));

        let reference = model.forward_t(&sentence_task, &second_inputs, None, None, false)?;
        let permuted = model.forward_t(&sentence_task, &permuted_second, None, None, false)?;
        assert!(reference
            .logits
            .index_select(0, &permutation)
            .allclose(&permuted.logits, 1e-6, 1e-6, false));
    }
    Ok(())
}

#[test]
fn degenerate_sentence_mask() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = build_model(&vs, PairEncoderType::simple)?;
    let task = Task::new("sst", 2, false)?;
    model.build_classifier(vs.root() / "sst", &task, ClassifierType::log_reg, 4, 0, 0.0)?;

    let sentences = Tensor::from_slice(&[3i64, 5, 0, 0]).view([2, 2]);
    let result = model.forward_t(&task, &sentences, None, None, false);
    assert!(matches!(result, Err(MtlError::DegenerateMaskError(_))));
    Ok(())
}

const CONFIG: &str = r#"{
    "vocab_size": 30,
    "embedding_dim": 4,
    "num_highway_layers": 1,
    "phrase_layer": {"type": "lstm", "input_dim": 4, "hidden_size": 2, "num_layers": 1, "bidirectional": true},
    "modeling_layer": {"type": "gru", "input_dim": 16, "hidden_size": 3, "bidirectional": true},
    "similarity_function": "linear",
    "dropout": 0.1,
    "pair_enc_type": "bidaf",
    "classifier_type": "fancy_mlp",
    "hidden_dim": 8
}"#;

#[test]
fn model_from_config_file() -> anyhow::Result<()> {
    let mut config_file = tempfile::NamedTempFile::new()?;
    config_file.write_all(CONFIG.as_bytes())?;
    let config = MultiTaskConfig::from_file(config_file.path())?;
    assert_eq!(config.pair_enc_type, PairEncoderType::bidaf);
    assert_eq!(config.classifier_type, ClassifierType::fancy_mlp);
    assert!(config.mask_lstms());

    let vs = nn::VarStore::new(Device::Cpu);
    let mut model = MultiTaskModel::from_config(vs.root() / "model", &config)?;
    let pair_task = Task::new("rte", 2, true)?;
    let sentence_task = Task::regression("sentiment", false)?;
    assert_eq!(model.input_dim_for(&pair_task), 22);
    assert_eq!(model.input_dim_for(&sentence_task), 4);

    model.build_task_classifier(vs.root() / "rte", &pair_task, &config)?;
    model.build_task_classifier(vs.root() / "sentiment", &sentence_task, &config)?;
    assert!(model.has_classifier("rte"));
    assert!(model.has_classifier("sentiment"));

    let output = model.forward_t(&pair_task, &question(), Some(&passage()), None, false)?;
    assert_eq!(output.logits.size(), vec![2, 2]);
    let scores = Tensor::from_slice(&[0.2f32, 0.7]);
    let output = model.forward_t(&sentence_task, &passage(), None, Some(&scores), false)?;
    assert_eq!(output.logits.size(), vec![2, 1]);
    assert!(sentence_task.get_metric(false) >= 0.0);
    Ok(())
}

#[test]
fn unknown_classifier_kind_in_config_file() -> anyhow::Result<()> {
    let mut config_file = tempfile::NamedTempFile::new()?;
    config_file.write_all(CONFIG.replace("fancy_mlp", "svm").as_bytes())?;
    assert!(matches!(
        MultiTaskConfig::from_file(config_file.path()),
        Err(MtlError::InvalidClassifierKind(_))
    ));
    Ok(())
}

#[test]
fn invalid_config_files() -> anyhow::Result<()> {
    let mut config_file = tempfile::NamedTempFile::new()?;
    config_file.write_all(br#"{"vocab_size": 30, "embedding_dim": "four"}"#)?;
    assert!(matches!(
        MultiTaskConfig::from_file(config_file.path()),
        Err(MtlError::ParsingError(_))
    ));

    let directory = tempfile::tempdir()?;
    assert!(matches!(
        MultiTaskConfig::from_file(directory.path().join("missing.json")),
        Err(MtlError::IOError(_))
    ));

    let mut config: MultiTaskConfig = serde_json::from_str(CONFIG)?;
    config.num_highway_layers = -1;
    assert!(config.validate().is_err());
    let vs = nn::VarStore::new(Device::Cpu);
    assert!(matches!(
        MultiTaskModel::from_config(vs.root(), &config),
        Err(MtlError::InvalidConfigurationError(_))
    ));
    Ok(())
}
