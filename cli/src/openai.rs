use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tricook_core::error::{Error, Result as CoreResult};
use tricook_core::models::{INGREDIENT_CATEGORIES, INGREDIENT_UNITS};
use tricook_core::service::IngredientExtractor;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f64 = 0.3;

const SYSTEM_PROMPT: &str = "Tu es un assistant expert en parsing de listes d'ingrédients. \
Tu retournes UNIQUEMENT un objet JSON avec les clés 'existing' et 'new', chaque clé contenant \
un tableau. Pour les catégories, tu DOIS utiliser EXACTEMENT les noms fournis dans la liste, \
sans modification. Pas de markdown, pas de texte avant ou après.";

/// Example ingredients per category, inlined into the prompt so the model
/// maps products onto the exact category names.
const CATEGORY_EXAMPLES: &[(&str, &str)] = &[
    ("Fruits et légumes", "tomate, pomme, carotte, salade, banane, poire, fraise"),
    ("Crèmerie et produits laitiers", "lait, fromage, yaourt, beurre, crème, fromage blanc"),
    ("Viandes et poissons", "poulet, bœuf, saumon, thon, jambon, porc, veau"),
    ("Charcuterie et traiteur", "saucisson, pâté, rillettes, jambon cru"),
    ("Surgelés", "légumes surgelés, glaces, poisson surgelé"),
    ("Bébé", "petits pots, lait infantile, couches"),
    ("Épicerie sucrée", "sucre, chocolat, miel, confiture, pâte à tartiner"),
    ("Épicerie salée", "sel, poivre, huile, vinaigre, pâtes, riz, farine"),
    ("Boissons", "eau, jus, soda, vin, bière"),
    ("Pains et pâtisseries", "pain, baguette, croissant, brioche"),
    ("Bio et écologie", "produits bio, légumes bio"),
    ("Entretien et nettoyage", "lessive, détergent, éponge"),
    ("Hygiène et beauté", "shampooing, savon, dentifrice"),
    ("Parapharmacie", "vitamines, compléments alimentaires"),
    ("Prouits du monde", "riz basmati, sauce soja, curry"),
    ("Nutrition et végétal", "tofu, lentilles, quinoa"),
    ("Épices et condiments", "moutarde, curry, herbes de Provence"),
    ("Autre", "pour tout ce qui ne correspond à aucune catégorie ci-dessus"),
];

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-backed implementation of the core `IngredientExtractor` trait.
///
/// The CLI is synchronous, so the client owns a small tokio runtime and
/// bridges onto it with `block_on`.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    rt: tokio::runtime::Runtime,
    api_key: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("tricook-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        Ok(Self {
            client,
            rt,
            api_key,
        })
    }

    async fn extract_async(&self, text: &str, known_ingredients: &[String]) -> CoreResult<String> {
        let prompt = build_prompt(text, known_ingredients);
        let request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        let resp = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ExtractionUnavailable(format!(
                "OpenAI API returned {status}: {body}"
            )));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ExtractionUnavailable("Empty response from the API".to_string()))
    }
}

impl IngredientExtractor for OpenAiExtractor {
    fn extract(&self, text: &str, known_ingredients: &[String]) -> CoreResult<String> {
        self.rt.block_on(self.extract_async(text, known_ingredients))
    }
}

fn build_prompt(text: &str, known_ingredients: &[String]) -> String {
    let units_list = INGREDIENT_UNITS.join(", ");
    let categories_list = INGREDIENT_CATEGORIES
        .iter()
        .enumerate()
        .map(|(idx, cat)| format!("{}. \"{cat}\"", idx + 1))
        .collect::<Vec<_>>()
        .join("\n");
    let category_examples = CATEGORY_EXAMPLES
        .iter()
        .map(|(cat, examples)| format!("\"{cat}\": {examples}"))
        .collect::<Vec<_>>()
        .join("\n");
    let existing_names = if known_ingredients.is_empty() {
        "aucun".to_string()
    } else {
        known_ingredients.join(", ")
    };

    format!(
        r#"Analyse ce texte de liste d'ingrédients et extrais tous les ingrédients avec leurs quantités et unités.

Unités disponibles (utiliser EXACTEMENT ces valeurs): {units_list}

Catégories disponibles (utiliser EXACTEMENT ces noms, sans modification):
{categories_list}

Exemples de correspondance catégorie:
{category_examples}

Ingrédients existants (normalisés): {existing_names}

Texte à analyser:
{text}

Retourne UNIQUEMENT un objet JSON avec deux tableaux (pas de markdown, pas de texte):
{{
  "existing": [
    {{"name": "nom normalisé en minuscules", "quantity": nombre, "unit": "unité"}}
  ],
  "new": [
    {{"name": "nom normalisé en minuscules", "quantity": nombre, "unit": "unité", "category": "catégorie EXACTE depuis la liste"}}
  ]
}}

Règles IMPORTANTES:
1. Si l'ingrédient existe (nom normalisé correspond), mettre dans "existing" (sans category)
2. Si l'ingrédient n'existe pas, mettre dans "new" (avec category OBLIGATOIRE)
3. Quantité manquante = 1
4. Unité manquante = inférer depuis le texte (ex: "200g" -> quantity: 200, unit: "g")
5. Si unité non déterminable = "unité"
6. Normaliser les noms (pluriel -> singulier, minuscules) pour correspondre aux ingrédients existants
7. Catégorie: UTILISER EXACTEMENT un nom de la liste, sans modification. Si incertain, utiliser "Autre"
8. Aucun ingrédient = {{"existing": [], "new": []}}
9. Format: objet JSON pur, rien d'autre

IMPORTANT: La catégorie doit être EXACTEMENT l'un des noms de la liste, avec les majuscules et accents corrects."#
    )
}
