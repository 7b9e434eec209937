//! Seed data script - populates the database with demo hotels
//!
//! Run with: cargo run --bin seed-data -- --hotels 15
//!
//! This creates:
//! - N hotels (default 15) across French and European cities
//! - 2 to 5 picture records per hotel, positioned 0..n
//!
//! Picture records point at `hotels/<uuid>.<ext>`; no image files are written.

use clap::Parser;
use rand::{seq::SliceRandom, Rng};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing::info;
use uuid::Uuid;

use hotel_api::{
    config, db,
    entities::{hotel, hotel_picture},
};

const CITIES: [&str; 15] = [
    "Paris",
    "Lyon",
    "Marseille",
    "Toulouse",
    "Nice",
    "Nantes",
    "Strasbourg",
    "Montpellier",
    "Bordeaux",
    "Lille",
    "Rennes",
    "Reims",
    "Le Havre",
    "Saint-Étienne",
    "Toulon",
];
const COUNTRIES: [&str; 6] = ["France", "Belgium", "Switzerland", "Spain", "Italy", "Germany"];
const NAME_PREFIXES: [&str; 10] = [
    "Grand", "Royal", "Le Petit", "Belle Vue", "Saint-Louis", "Les Tilleuls", "Le Moulin",
    "Bellevue", "Du Parc", "La Plage",
];
const STREETS: [&str; 8] = [
    "rue de la République",
    "avenue Victor Hugo",
    "boulevard Gambetta",
    "rue Nationale",
    "place de la Mairie",
    "quai des Brumes",
    "rue du Port",
    "avenue Jean Jaurès",
];
const DESCRIPTIONS: [&str; 4] = [
    "A quiet hotel close to the old town, with a garden terrace and breakfast served until noon.",
    "Modern rooms, a rooftop bar and easy access to public transport.",
    "Family-run since 1952. Rooms overlook the harbour.",
    "Spa, indoor pool and a restaurant serving regional cuisine.",
];
const EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Parser)]
#[command(name = "seed-data", about = "Populate the database with demo hotels", version)]
struct Cli {
    #[arg(long, default_value_t = 15, help = "Number of hotels to create")]
    hotels: usize,

    #[arg(long, help = "Apply migrations before seeding")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== Hotel API Seed Data ===");
    info!("Connecting to database: {}", cfg.database_url());
    let db = db::establish_connection_from_app_config(&cfg).await?;
    if cli.migrate {
        db::run_migrations(&db).await?;
    }

    let mut picture_total = 0;
    for _ in 0..cli.hotels {
        let hotel = fake_hotel().insert(&db).await?;
        let pictures = create_pictures(&db, hotel.id).await?;
        picture_total += pictures;
        info!(hotel_id = hotel.id, pictures, "  Created {}", hotel.name);
    }

    info!(
        "Seeded {} hotels and {} pictures",
        cli.hotels, picture_total
    );
    Ok(())
}

fn random_decimal(rng: &mut impl Rng, min: i64, max: i64, scale: u32) -> Decimal {
    let factor = 10_i64.pow(scale);
    Decimal::new(rng.gen_range(min * factor..=max * factor), scale)
}

fn fake_hotel() -> hotel::ActiveModel {
    let mut rng = rand::thread_rng();

    let prefix = NAME_PREFIXES.choose(&mut rng).copied().unwrap_or("Grand");
    let street = STREETS.choose(&mut rng).copied().unwrap_or("rue Nationale");
    let city = CITIES.choose(&mut rng).copied().unwrap_or("Paris");
    let country = COUNTRIES.choose(&mut rng).copied().unwrap_or("France");

    let address2 = rng
        .gen_bool(0.3)
        .then(|| format!("Bâtiment {}", rng.gen_range(1..=9)));
    let description = rng
        .gen_bool(0.8)
        .then(|| DESCRIPTIONS.choose(&mut rng).copied().unwrap_or_default().to_string());

    hotel::ActiveModel {
        name: Set(format!("{} {} Hotel", prefix, city)),
        address1: Set(format!("{} {}", rng.gen_range(1..=250), street)),
        address2: Set(address2),
        zipcode: Set(format!("{:05}", rng.gen_range(1000..=95999))),
        city: Set(city.to_string()),
        country: Set(country.to_string()),
        lat: Set(random_decimal(&mut rng, -90, 90, 8)),
        lng: Set(random_decimal(&mut rng, -180, 180, 8)),
        description: Set(description),
        max_capacity: Set(rng.gen_range(1..=200)),
        price_per_night: Set(random_decimal(&mut rng, 50, 500, 2)),
        ..Default::default()
    }
}

async fn create_pictures(db: &DatabaseConnection, hotel_id: i32) -> anyhow::Result<usize> {
    let count = rand::thread_rng().gen_range(2..=5);

    for position in 0..count {
        let (extension, filesize) = {
            let mut rng = rand::thread_rng();
            (
                EXTENSIONS.choose(&mut rng).copied().unwrap_or("jpg"),
                rng.gen_range(100_000..=5_000_000_i64),
            )
        };

        hotel_picture::ActiveModel {
            hotel_id: Set(hotel_id),
            filepath: Set(format!("hotels/{}.{}", Uuid::new_v4(), extension)),
            filesize: Set(filesize),
            position: Set(position as i32),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(count)
}
