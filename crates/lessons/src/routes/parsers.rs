//! Output parser lessons: lists, validated records and JSON extraction

use axum::extract::State;
use chain_kit::parser::{
    CommaSeparatedListParser, JsonOutputParser, OutputParser, TypedOutputParser,
};
use chain_kit::prompt::{vars, ChatPromptTemplate, Vars};
use chain_kit::runnable::{LlmStep, Runnable};
use llm_core::{ChatOptions, ChatResponse};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{respond, LessonJson, ValidQuery};
use crate::service::LlmService;
use crate::state::AppState;

const REVIEW_TEMPLATE: &str = "Analyze the following customer review and extract the required information. If information is not present in the review, use null for that field. {format_instructions}
text: ```{customer_review}```
";

const SAMPLE_REVIEW: &str = "I bought the Acme 3000 blender as a gift for my mom's birthday, and she absolutely loves it! I ordered it online and it arrived in just 3 days. It cost more than I expected, but the performance justifies the price.";

/// Structured movie information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Movie {
    /// The title of the movie
    pub title: String,
    /// The director of the movie
    pub director: String,
    /// The year the movie was released
    pub year: i32,
    /// The primary genre of the movie
    pub genre: String,
    /// Rating from 0-10
    #[validate(range(min = 0.0, max = 10.0))]
    pub rating: f64,
}

/// Address information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Address {
    /// Street address
    pub street: String,
    /// City name
    pub city: String,
    /// Country name
    pub country: String,
}

/// Company with nested address structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Company {
    /// Company name
    pub name: String,
    /// Number of employees
    pub employees: u64,
    /// Company headquarters address
    pub headquarters: Address,
}

/// Book with list fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Book {
    /// Book title
    pub title: String,
    /// Author name
    pub author: String,
    /// List of genres
    pub genres: Vec<String>,
    /// List of descriptive tags
    pub tags: Vec<String>,
}

/// Structured extraction from customer reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewExtraction {
    /// Indicates if the review mentions giving the product as a gift, null if not mentioned
    #[serde(default)]
    pub gift: Option<bool>,
    /// Number of days taken for delivery as mentioned in the review, null if not mentioned
    #[serde(default)]
    pub delivery_days: Option<u32>,
    /// Customer's opinion on the price vs value of the product, null if not mentioned
    #[serde(default)]
    pub price_value: Option<String>,
}

/// `prompt | llm | parser`, with the parser's format instructions spliced in
async fn extract<P, O>(
    llm: LlmService,
    template: &str,
    mut inputs: Vars,
    parser: P,
    options: Option<ChatOptions>,
) -> chain_kit::Result<O>
where
    P: OutputParser<Output = O> + Runnable<Input = ChatResponse, Output = O> + 'static,
    O: Send + 'static,
{
    inputs.insert("format_instructions".into(), OutputParser::format_instructions(&parser));
    let mut step = LlmStep::new(llm.shared());
    if let Some(options) = options {
        step = step.with_options(options);
    }
    ChatPromptTemplate::from_template(template)?
        .pipe(step)
        .pipe(parser)
        .invoke(inputs)
        .await
}

async fn generate<T>(llm: LlmService, template: &str) -> chain_kit::Result<T>
where
    T: DeserializeOwned + JsonSchema + Send + 'static,
{
    extract(llm, template, Vars::new(), JsonOutputParser::<T>::new(), None).await
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryQuery {
    #[validate(length(min = 1))]
    category: Option<String>,
}

pub async fn comma_list(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CategoryQuery>,
) -> LessonJson<Vec<String>> {
    let category = query
        .category
        .unwrap_or_else(|| "popular programming languages".into());
    let items = extract(
        state.llm("/api/parsers/comma-list"),
        "List 5 {category}.\n{format_instructions}",
        vars([("category", category)]),
        CommaSeparatedListParser,
        None,
    )
    .await?;
    respond(items)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenreQuery {
    #[validate(length(min = 1))]
    genre: Option<String>,
}

pub async fn typed(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<GenreQuery>,
) -> LessonJson<Movie> {
    let genre = query.genre.unwrap_or_else(|| "sci-fi".into());
    let movie = extract(
        state.llm("/api/parsers/typed"),
        "Generate information about a famous {genre} movie.\n{format_instructions}",
        vars([("genre", genre)]),
        TypedOutputParser::<Movie>::new(),
        None,
    )
    .await?;
    respond(movie)
}

pub async fn nested_json(State(state): State<AppState>) -> LessonJson<Company> {
    let company = generate(
        state.llm("/api/parsers/nested-json"),
        "Generate a fictional tech company with headquarters address.\n{format_instructions}",
    )
    .await?;
    respond(company)
}

pub async fn json_list(State(state): State<AppState>) -> LessonJson<Book> {
    let book = generate(
        state.llm("/api/parsers/json-list"),
        "Create a fictional science fiction book with multiple genres and tags.\n{format_instructions}",
    )
    .await?;
    respond(book)
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewQuery {
    #[validate(length(min = 1, max = 5000))]
    review: Option<String>,
}

/// Extraction runs at temperature 0 for repeatable fields
pub async fn review_json(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ReviewQuery>,
) -> LessonJson<ReviewExtraction> {
    let review = query.review.unwrap_or_else(|| SAMPLE_REVIEW.into());
    let extraction = extract(
        state.llm("/api/parsers/json"),
        REVIEW_TEMPLATE,
        vars([("customer_review", review)]),
        JsonOutputParser::<ReviewExtraction>::new(),
        Some(ChatOptions::with_temperature(0.0)),
    )
    .await?;
    respond(extraction)
}
